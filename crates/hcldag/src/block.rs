//! block instances and their optional capabilities
//!
//! Every block kind is a plain struct holding a [BaseBlock] (raw block, kind info, schema,
//! lifecycle flags) plus its typed fields. Implementing [BlockKind] gives a kind everything it
//! needs to be stored in the graph; the capability accessors of [Block] (pre-plan, plan, apply,
//! custom decode, ...) are opted into one by one.
//!
//! ```
//! use hcldag::block::{BaseBlock, Block, BlockKind, PlanBlock, PlanContext};
//! use hcldag::schema::BlockSchema;
//! use hcldag::types::TypeConstraint;
//!
//! #[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
//! #[serde(default)]
//! struct Bucket {
//!     #[serde(skip)]
//!     base: BaseBlock,
//!     region: String,
//! }
//!
//! impl BlockKind for Bucket {
//!     const BLOCK_TYPE: &'static str = "resource";
//!     const TYPE_LABEL: &'static str = "bucket";
//!
//!     fn schema() -> BlockSchema {
//!         BlockSchema::new().required_attribute("region", TypeConstraint::String)
//!     }
//!     fn base(&self) -> &BaseBlock { &self.base }
//!     fn base_mut(&mut self) -> &mut BaseBlock { &mut self.base }
//! }
//!
//! impl Block for Bucket {
//!     fn as_plan(&mut self) -> Option<&mut dyn PlanBlock> { Some(self) }
//! }
//!
//! impl PlanBlock for Bucket {
//!     fn execute_during_plan(&mut self, _cx: &PlanContext) -> Result<(), hcldag::error::Error> {
//!         Ok(())
//!     }
//! }
//! ```
use crate::error::Error;
use crate::eval::EvalContext;
use crate::raw_block::{ForEach, RawBlock};
use crate::schema::BlockSchema;
use crate::value;
use crate::variables::InputVariables;
use hcl::Value;
use std::any::Any;
use std::sync::Arc;

/// Static description of a registered kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindInfo {
    pub block_type: &'static str,
    /// empty for kinds addressed without a type label (`variable`, `local`)
    pub type_label: &'static str,
    pub ref_keyword: &'static str,
    pub single_value: bool,
}

impl KindInfo {
    /// Number of path segments of an address: keyword, optional type label, name
    pub fn address_length(&self) -> usize {
        if self.type_label.is_empty() {
            2
        } else {
            3
        }
    }
}

/// State shared by every block kind
#[derive(Debug, Default)]
pub struct BaseBlock {
    raw: RawBlock,
    info: KindInfo,
    schema: Arc<BlockSchema>,
    expanded: bool,
    ready: bool,
    decoded: bool,
}

impl BaseBlock {
    pub fn new(raw: RawBlock, info: KindInfo, schema: Arc<BlockSchema>) -> Self {
        Self {
            // an instance bound to a `for_each` element is expanded from the start
            expanded: raw.for_each.is_some(),
            raw,
            info,
            schema,
            ready: false,
            decoded: false,
        }
    }

    pub fn raw(&self) -> &RawBlock {
        &self.raw
    }

    pub fn info(&self) -> &KindInfo {
        &self.info
    }

    pub fn schema(&self) -> &Arc<BlockSchema> {
        &self.schema
    }

    pub fn address(&self) -> String {
        self.raw.address(self.info.ref_keyword)
    }

    pub fn block_type(&self) -> &str {
        &self.raw.block_type
    }

    pub fn type_label(&self) -> &str {
        self.info.type_label
    }

    pub fn name(&self) -> &str {
        self.raw.name()
    }

    pub fn for_each(&self) -> Option<&ForEach> {
        self.raw.for_each.as_ref()
    }

    /// Carries a `for_each` attribute that was not resolved into instances yet
    pub fn expandable(&self) -> bool {
        !self.expanded && self.raw.for_each.is_none() && self.raw.attribute("for_each").is_some()
    }

    pub fn mark_expanded(&mut self) {
        self.expanded = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    pub fn is_decoded(&self) -> bool {
        self.decoded
    }

    pub fn mark_decoded(&mut self) {
        self.decoded = true;
    }

    /// `ctx` extended with `each` for an expanded instance
    pub fn bind_each(&self, ctx: &EvalContext) -> EvalContext {
        match &self.raw.for_each {
            Some(for_each) => ctx.with_var("each", for_each.to_value()),
            None => ctx.clone(),
        }
    }
}

/// Implemented by every concrete block kind
///
/// The typed fields are (de)serialized with serde, `base` must be `#[serde(skip)]` and the struct
/// should use `#[serde(default)]` so absent attributes keep their default.
pub trait BlockKind:
    serde::Serialize
    + serde::de::DeserializeOwned
    + Default
    + std::fmt::Debug
    + Send
    + Sync
    + 'static
{
    const BLOCK_TYPE: &'static str;
    const TYPE_LABEL: &'static str = "";
    /// keyword used in references and addresses, defaults to the block type
    const REF_KEYWORD: Option<&'static str> = None;
    /// exposed as a single value (`local.x`) instead of an object of its fields
    const SINGLE_VALUE: bool = false;

    fn schema() -> BlockSchema;
    fn base(&self) -> &BaseBlock;
    fn base_mut(&mut self) -> &mut BaseBlock;

    fn info() -> KindInfo {
        KindInfo {
            block_type: Self::BLOCK_TYPE,
            type_label: Self::TYPE_LABEL,
            ref_keyword: Self::REF_KEYWORD.unwrap_or(Self::BLOCK_TYPE),
            single_value: Self::SINGLE_VALUE,
        }
    }
}

/// Object safe access to a block's base and typed fields
///
/// Implemented for every [BlockKind].
pub trait Typed: std::fmt::Debug + Send + Sync {
    fn base(&self) -> &BaseBlock;
    fn base_mut(&mut self) -> &mut BaseBlock;
    /// the typed fields as an object
    fn to_value(&self) -> Result<Value, Error>;
    /// replace the typed fields, the base is kept
    fn load(&mut self, value: &Value) -> Result<(), Error>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<K: BlockKind> Typed for K {
    fn base(&self) -> &BaseBlock {
        BlockKind::base(self)
    }

    fn base_mut(&mut self) -> &mut BaseBlock {
        BlockKind::base_mut(self)
    }

    fn to_value(&self) -> Result<Value, Error> {
        Ok(value::serialize(self)?)
    }

    fn load(&mut self, value: &Value) -> Result<(), Error> {
        let mut loaded: K = value::deserialize(value)?;
        std::mem::swap(BlockKind::base_mut(&mut loaded), BlockKind::base_mut(self));
        *self = loaded;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A block instance stored in the graph
///
/// A capability that is not provided means the block is skipped for it.
pub trait Block: Typed {
    fn as_pre_plan(&mut self) -> Option<&mut dyn PrePlanBlock> {
        None
    }

    fn as_plan(&mut self) -> Option<&mut dyn PlanBlock> {
        None
    }

    fn as_apply(&mut self) -> Option<&mut dyn ApplyBlock> {
        None
    }

    fn as_custom_decode(&mut self) -> Option<&mut dyn CustomDecode> {
        None
    }

    fn as_base_decode(&mut self) -> Option<&mut dyn BaseDecode> {
        None
    }

    fn as_single_value(&self) -> Option<&dyn SingleValueBlock> {
        None
    }

    /// Value other blocks see when referencing this one
    fn value(&self) -> Result<Value, Error> {
        match self.as_single_value() {
            Some(single) => Ok(single.single_value()),
            None => self.to_value(),
        }
    }
}

/// Everything a block may need while it is executed
pub struct PlanContext<'c> {
    pub eval: EvalContext,
    pub inputs: &'c InputVariables,
}

/// Outcome of [PrePlanBlock::execute_before_plan]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// value is available to other blocks
    Ready,
    /// depends on something only available during plan
    Deferred,
}

/// Resolved before planning, so `for_each` expressions can use the value
pub trait PrePlanBlock {
    fn execute_before_plan(&mut self, cx: &PlanContext) -> Result<Resolution, Error>;
}

pub trait PlanBlock {
    fn execute_during_plan(&mut self, cx: &PlanContext) -> Result<(), Error>;
}

pub trait ApplyBlock {
    fn apply(&mut self, cx: &PlanContext) -> Result<(), Error>;
}

/// Replaces the whole standard decode
pub trait CustomDecode {
    fn decode(&mut self, raw: &RawBlock, ctx: &EvalContext) -> Result<(), Error>;
}

/// Runs as part of the standard decode, for fields the schema does not describe
///
/// Called after the schema-described fields were loaded, so they can be read here. Loading replaces
/// the whole struct, anything set before it would be lost. A value written to a schema-described
/// field is kept.
pub trait BaseDecode {
    fn base_decode(&mut self, raw: &RawBlock, ctx: &EvalContext) -> Result<(), Error>;
}

pub trait SingleValueBlock {
    fn single_value(&self) -> Value;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::SourceRange;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
    #[serde(default)]
    struct Sample {
        #[serde(skip)]
        base: BaseBlock,
        name: String,
        tags: Vec<String>,
    }

    impl BlockKind for Sample {
        const BLOCK_TYPE: &'static str = "data";
        const TYPE_LABEL: &'static str = "sample";

        fn schema() -> BlockSchema {
            BlockSchema::new()
        }
        fn base(&self) -> &BaseBlock {
            &self.base
        }
        fn base_mut(&mut self) -> &mut BaseBlock {
            &mut self.base
        }
    }

    impl Block for Sample {}

    fn sample() -> Sample {
        let raw = RawBlock::new(
            "data",
            vec!["sample".into(), "foo".into()],
            SourceRange::default(),
        );
        Sample {
            base: BaseBlock::new(raw, Sample::info(), Default::default()),
            ..Default::default()
        }
    }

    #[test]
    fn load_keeps_base() {
        let mut block = sample();
        block.base.mark_ready();

        let value = value::from_json(serde_json::json!({ "name": "n", "tags": ["a"] }));
        block.load(&value).unwrap();

        assert_eq!(block.name, "n");
        assert_eq!(block.tags, ["a"]);
        assert!(block.base.is_ready());
        assert_eq!(block.base.address(), "data.sample.foo");
    }

    #[test]
    fn value_of_typed_fields() {
        let mut block = sample();
        block.name = "n".into();

        assert_eq!(
            value::to_json(&block.value().unwrap()),
            serde_json::json!({ "name": "n", "tags": [] })
        );
    }

    #[test]
    fn expandable_until_expanded() {
        let mut block = sample();
        assert!(!block.base.expandable());

        let empty = hcl::Expression::Array(vec![]);
        block.base.raw.insert_attribute("for_each", empty, SourceRange::default());
        assert!(block.base.expandable());

        block.base.mark_expanded();
        assert!(!block.base.expandable());
    }
}
