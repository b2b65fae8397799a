//! known block kinds
//!
//! A [BlockRegistry] is filled once (before loading any configuration) and then shared read-only.
use crate::block::{BaseBlock, Block, BlockKind, KindInfo, Typed};
use crate::blocks::{LocalBlock, VariableBlock};
use crate::error::Error;
use crate::raw_block::RawBlock;
use crate::schema::BlockSchema;
use indexmap::IndexMap;
use std::sync::Arc;

type Constructor = fn(RawBlock, &KindEntry) -> Result<Box<dyn Block>, Error>;

/// A registered kind: its info, schema and constructor
pub struct KindEntry {
    pub info: KindInfo,
    pub schema: Arc<BlockSchema>,
    construct: Constructor,
}

impl std::fmt::Debug for KindEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindEntry")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl KindEntry {
    /// New instance for `raw`: base attached and schema defaults applied
    pub fn construct(&self, raw: RawBlock) -> Result<Box<dyn Block>, Error> {
        (self.construct)(raw, self)
    }
}

fn construct<K: BlockKind + Block>(
    raw: RawBlock,
    entry: &KindEntry,
) -> Result<Box<dyn Block>, Error> {
    let mut block = K::default();
    *BlockKind::base_mut(&mut block) = BaseBlock::new(raw, entry.info, entry.schema.clone());
    Typed::load(&mut block, &entry.schema.defaults())?;
    Ok(Box::new(block))
}

#[derive(Debug, Default)]
pub struct BlockRegistry {
    /// block type -> type label -> kind
    kinds: IndexMap<&'static str, IndexMap<&'static str, Arc<KindEntry>>>,
    /// reference keyword -> address length
    ref_keywords: IndexMap<&'static str, usize>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `local` and `variable` kinds
    pub fn with_common_kinds() -> Self {
        let mut registry = Self::new();
        registry.register::<LocalBlock>();
        registry.register::<VariableBlock>();
        registry
    }

    pub fn register<K: BlockKind + Block>(&mut self) -> &mut Self {
        let info = K::info();
        tracing::debug!(
            block_type = info.block_type,
            type_label = info.type_label,
            "registering block kind"
        );

        // the first kind under a keyword decides how its references are read
        self.ref_keywords
            .entry(info.ref_keyword)
            .or_insert_with(|| info.address_length());

        self.kinds.entry(info.block_type).or_default().insert(
            info.type_label,
            Arc::new(KindEntry {
                info,
                schema: Arc::new(K::schema()),
                construct: construct::<K>,
            }),
        );
        self
    }

    pub fn is_block_type_recognized(&self, block_type: &str) -> bool {
        if block_type == "locals" {
            return self.kinds.contains_key("local");
        }
        self.kinds.contains_key(block_type)
    }

    /// Number of path segments forming an address under `ref_keyword`
    pub fn address_length(&self, ref_keyword: &str) -> Option<usize> {
        self.ref_keywords.get(ref_keyword).copied()
    }

    pub fn ref_keywords(&self) -> impl Iterator<Item = &str> {
        self.ref_keywords.keys().copied()
    }

    /// The kind responsible for `raw`
    pub fn resolve(&self, raw: &RawBlock) -> Result<&Arc<KindEntry>, Error> {
        let Some(kinds) = self.kinds.get(raw.block_type.as_str()) else {
            return Err(Error::UnknownBlockType {
                block_type: raw.block_type.clone(),
                range: raw.range.clone(),
            });
        };

        if let Some(untyped) = kinds.get("") {
            if raw.labels.len() != 1 {
                return Err(Error::LabelCount {
                    block_type: raw.block_type.clone(),
                    expected: 1,
                    actual: raw.labels.len(),
                    range: raw.range.clone(),
                });
            }
            return Ok(untyped);
        }

        let [type_label, _name] = raw.labels.as_slice() else {
            return Err(Error::LabelCount {
                block_type: raw.block_type.clone(),
                expected: 2,
                actual: raw.labels.len(),
                range: raw.range.clone(),
            });
        };

        kinds
            .get(type_label.as_str())
            .ok_or_else(|| Error::UnregisteredKind {
                block_type: raw.block_type.clone(),
                type_label: type_label.clone(),
                range: raw.range.clone(),
            })
    }

    /// Build the instance for `raw`
    pub fn construct(&self, raw: RawBlock) -> Result<Box<dyn Block>, Error> {
        self.resolve(&raw)?.clone().construct(raw)
    }

    /// Address `raw` will be known by, without constructing it
    pub fn address(&self, raw: &RawBlock) -> Result<String, Error> {
        Ok(raw.address(self.resolve(raw)?.info.ref_keyword))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::SourceRange;
    use pretty_assertions::assert_eq;

    fn raw(block_type: &str, labels: &[&str]) -> RawBlock {
        RawBlock::new(
            block_type,
            labels.iter().map(|l| l.to_string()).collect(),
            SourceRange::default(),
        )
    }

    #[test]
    fn common_kinds() {
        let registry = BlockRegistry::with_common_kinds();

        assert!(registry.is_block_type_recognized("variable"));
        assert!(registry.is_block_type_recognized("local"));
        assert!(registry.is_block_type_recognized("locals"));
        assert!(!registry.is_block_type_recognized("data"));

        assert_eq!(registry.address_length("var"), Some(2));
        assert_eq!(registry.address_length("local"), Some(2));
        assert_eq!(registry.address_length("variable"), None);
    }

    #[test]
    fn resolve_errors() {
        let registry = BlockRegistry::with_common_kinds();

        let error = registry.resolve(&raw("data", &["dummy", "foo"])).unwrap_err();
        assert!(error.to_string().starts_with("invalid block type: data"));

        let error = registry.resolve(&raw("variable", &["a", "b"])).unwrap_err();
        assert!(matches!(error, Error::LabelCount { expected: 1, actual: 2, .. }));
    }

    #[test]
    fn variables_are_addressed_as_var() {
        let registry = BlockRegistry::with_common_kinds();
        let block = registry.construct(raw("variable", &["region"])).unwrap();

        assert_eq!(block.base().address(), "var.region");
        assert_eq!(registry.address(&raw("local", &["x"])).unwrap(), "local.x");
    }
}
