//! unevaluated blocks as they appear in the source
//!
//! A [RawBlock] keeps attributes as [hcl::Expression]s together with the source range they came
//! from. Nothing is evaluated until a block is expanded (`for_each`) or decoded.
use crate::error::Error;
use crate::eval::EvalContext;
use crate::source::SourceRange;
use crate::util::expression_from_edit;
use crate::value::{self, ArrayKeys};
use hcl::{Expression, Value};
use hcl_edit::Span;
use indexmap::IndexMap;
use std::path::Path;

/// attributes handled by the engine instead of the block kind
pub const META_ATTRIBUTES: [&str; 2] = ["for_each", "depends_on"];
/// nested blocks handled by the engine instead of the block kind
pub const META_BLOCKS: [&str; 2] = ["precondition", "dynamic"];

#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub name: String,
    pub expr: Expression,
    pub range: SourceRange,
}

/// Repetition binding of an expanded block, exposed to expressions as `each`
#[derive(Debug, Clone, PartialEq)]
pub struct ForEach {
    pub key: Value,
    pub value: Value,
}

impl ForEach {
    pub fn new(key: Value, value: Value) -> Self {
        Self { key, value }
    }

    pub fn to_value(&self) -> Value {
        value::iterator_object(self.key.clone(), self.value.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawBlock {
    pub block_type: String,
    pub labels: Vec<String>,
    pub attributes: IndexMap<String, RawAttribute>,
    pub blocks: Vec<RawBlock>,
    pub for_each: Option<ForEach>,
    pub range: SourceRange,
}

impl RawBlock {
    pub fn new(block_type: impl Into<String>, labels: Vec<String>, range: SourceRange) -> Self {
        Self {
            block_type: block_type.into(),
            labels,
            range,
            ..Default::default()
        }
    }

    /// Convert a parsed block (and all nested blocks)
    pub fn from_edit(block: &hcl_edit::structure::Block, path: Option<&Path>, text: &str) -> Self {
        let range = |span| SourceRange::new(path.map(Path::to_path_buf), text, span);

        let labels = block
            .labels
            .iter()
            .map(|label| {
                let label: &str = label.as_ref();
                label.to_string()
            })
            .collect();

        let mut raw = Self::new(block.ident.value().as_str(), labels, range(block.span()));

        for attribute in block.body.attributes() {
            let name = attribute.key.value().to_string();
            raw.attributes.insert(
                name.clone(),
                RawAttribute {
                    name,
                    expr: expression_from_edit(attribute.value.clone()),
                    range: range(attribute.span()),
                },
            );
        }

        raw.blocks = block
            .body
            .blocks()
            .map(|nested| Self::from_edit(nested, path, text))
            .collect();

        raw
    }

    pub fn insert_attribute(
        &mut self,
        name: impl Into<String>,
        expr: Expression,
        range: SourceRange,
    ) {
        let name = name.into();
        self.attributes.insert(name.clone(), RawAttribute { name, expr, range });
    }

    pub fn attribute(&self, name: &str) -> Option<&RawAttribute> {
        self.attributes.get(name)
    }

    /// Last label, the name used in references
    pub fn name(&self) -> &str {
        self.labels.last().map(String::as_str).unwrap_or_default()
    }

    /// `<keyword>.<labels...>` plus `[key]` for an expanded block
    pub fn address(&self, ref_keyword: &str) -> String {
        let mut address = ref_keyword.to_string();
        for label in self.labels.iter().filter(|label| !label.is_empty()) {
            address.push('.');
            address.push_str(label);
        }

        if let Some(for_each) = &self.for_each {
            address.push('[');
            address.push_str(&value::key_string(&for_each.key));
            address.push(']');
        }

        address
    }

    /// Copy of this block bound to one element of its `for_each` collection
    pub fn with_for_each(&self, for_each: ForEach) -> Self {
        Self {
            for_each: Some(for_each),
            ..self.clone()
        }
    }

    /// Copy of the body without meta attributes and meta blocks
    pub fn without_meta(&self) -> Self {
        Self {
            attributes: self
                .attributes
                .iter()
                .filter(|(name, _)| !META_ATTRIBUTES.contains(&name.as_str()))
                .map(|(name, attribute)| (name.clone(), attribute.clone()))
                .collect(),
            blocks: self
                .blocks
                .iter()
                .filter(|block| !META_BLOCKS.contains(&block.block_type.as_str()))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    pub fn nested_blocks<'s>(&'s self, block_type: &'s str) -> impl Iterator<Item = &'s RawBlock> {
        self.blocks
            .iter()
            .filter(move |block| block.block_type == block_type)
    }

    /// Replace every `dynamic "x" { for_each = ..  content { .. } }` with the generated `x` blocks
    ///
    /// Inside `content` the iterator is named after the label (`x.key`, `x.value`). Attributes of
    /// every nested block are evaluated on the way, so the result only contains literal expressions
    /// below the top level.
    #[tracing::instrument(level = "trace", skip_all, fields(block_type = %self.block_type))]
    pub fn expand_dynamic_blocks(&self, ctx: &EvalContext) -> Result<Self, Error> {
        let mut expanded = Self {
            blocks: Vec::with_capacity(self.blocks.len()),
            ..self.clone()
        };

        for block in &self.blocks {
            if block.block_type != "dynamic" {
                if META_BLOCKS.contains(&block.block_type.as_str()) {
                    expanded.blocks.push(block.clone());
                    continue;
                }

                let mut nested = block.expand_dynamic_blocks(ctx)?;
                nested.evaluate_attributes(ctx)?;
                expanded.blocks.push(nested);
                continue;
            }

            let Some(for_each) = block.attribute("for_each") else {
                return Err(Error::DynamicWithoutForEach {
                    range: block.range.clone(),
                });
            };
            let [iterator] = block.labels.as_slice() else {
                return Err(Error::DynamicLabel {
                    range: block.range.clone(),
                });
            };

            let collection = ctx
                .evaluate(&for_each.expr)
                .map_err(|e| Error::evaluate(&for_each.range, e))?;
            let Some(elements) = value::elements(&collection, ArrayKeys::Indices) else {
                return Err(Error::ForEachNotIterable {
                    got: value::type_name(&collection),
                    range: for_each.range.clone(),
                });
            };

            tracing::trace!(%iterator, count = elements.len(), "expanding dynamic block");

            for (key, value) in elements {
                let iteration_ctx =
                    ctx.with_var(iterator.as_str(), value::iterator_object(key, value));

                for content in &block.blocks {
                    if content.block_type != "content" {
                        return Err(Error::DynamicContent {
                            range: content.range.clone(),
                        });
                    }

                    let mut generated = content.expand_dynamic_blocks(&iteration_ctx)?;
                    generated.block_type = iterator.clone();
                    generated.labels = vec![];
                    generated.evaluate_attributes(&iteration_ctx)?;
                    expanded.blocks.push(generated);
                }
            }
        }

        Ok(expanded)
    }

    fn evaluate_attributes(&mut self, ctx: &EvalContext) -> Result<(), Error> {
        for attribute in self.attributes.values_mut() {
            let value = ctx
                .evaluate(&attribute.expr)
                .map_err(|e| Error::evaluate(&attribute.range, e))?;
            attribute.expr = value::to_expression(value);
        }
        Ok(())
    }
}
