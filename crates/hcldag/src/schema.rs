//! explicit description of what a block kind accepts
//!
//! Every kind describes its attributes (name, type, required, default) and nested blocks once, when
//! it is registered. [BlockSchema::decode] evaluates a raw body against that description and
//! produces a plain [hcl::Value] object which is then loaded into the typed fields of the block.
use crate::error::{Error, Errors};
use crate::eval::EvalContext;
use crate::raw_block::RawBlock;
use crate::types::TypeConstraint;
use hcl::Value;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSchema {
    pub name: String,
    pub constraint: TypeConstraint,
    pub required: bool,
    pub default: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct NestedBlockSchema {
    pub name: String,
    /// decoded as a list of objects if set, else as a single (optional) object
    pub repeated: bool,
    schema: fn() -> BlockSchema,
}

impl NestedBlockSchema {
    pub fn schema(&self) -> BlockSchema {
        (self.schema)()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlockSchema {
    attributes: IndexMap<String, AttributeSchema>,
    blocks: IndexMap<String, NestedBlockSchema>,
}

impl BlockSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// optional attribute
    pub fn attribute(mut self, name: &str, constraint: TypeConstraint) -> Self {
        self.insert_attribute(name, constraint, false, None);
        self
    }

    pub fn required_attribute(mut self, name: &str, constraint: TypeConstraint) -> Self {
        self.insert_attribute(name, constraint, true, None);
        self
    }

    /// optional attribute, `default` applies when absent or null
    pub fn attribute_with_default(
        mut self,
        name: &str,
        constraint: TypeConstraint,
        default: impl Into<Value>,
    ) -> Self {
        self.insert_attribute(name, constraint, false, Some(default.into()));
        self
    }

    /// any number of nested `name { .. }` blocks
    pub fn blocks(mut self, name: &str, schema: fn() -> BlockSchema) -> Self {
        self.insert_block(name, schema, true);
        self
    }

    /// at most one nested `name { .. }` block
    pub fn block(mut self, name: &str, schema: fn() -> BlockSchema) -> Self {
        self.insert_block(name, schema, false);
        self
    }

    fn insert_attribute(
        &mut self,
        name: &str,
        constraint: TypeConstraint,
        required: bool,
        default: Option<Value>,
    ) {
        self.attributes.insert(
            name.to_string(),
            AttributeSchema {
                name: name.to_string(),
                constraint,
                required,
                default,
            },
        );
    }

    fn insert_block(&mut self, name: &str, schema: fn() -> BlockSchema, repeated: bool) {
        self.blocks.insert(
            name.to_string(),
            NestedBlockSchema {
                name: name.to_string(),
                repeated,
                schema,
            },
        );
    }

    pub fn attributes(&self) -> impl Iterator<Item = &AttributeSchema> {
        self.attributes.values()
    }

    pub fn nested_blocks(&self) -> impl Iterator<Item = &NestedBlockSchema> {
        self.blocks.values()
    }

    /// Object holding only the declared default values
    pub fn defaults(&self) -> Value {
        let mut object = hcl::Map::new();
        self.apply_defaults(&mut object);
        Value::Object(object)
    }

    /// Fill in defaults for attributes that are absent or null
    pub fn apply_defaults(&self, object: &mut hcl::Map<String, Value>) {
        for attribute in self.attributes.values() {
            let Some(default) = &attribute.default else {
                continue;
            };

            let missing = object.get(&attribute.name).map_or(true, Value::is_null);
            if missing {
                object.insert(attribute.name.clone(), default.clone());
            }
        }
    }

    /// Evaluate `block` (meta attributes and meta blocks removed already) against this schema
    ///
    /// Problems are collected: unknown attributes and blocks, missing required attributes, type
    /// mismatches and evaluation failures are all reported together.
    pub fn decode(&self, block: &RawBlock, ctx: &EvalContext) -> Result<Value, Errors> {
        let mut errors = Errors::new();
        let mut object = hcl::Map::new();

        for (name, attribute) in &block.attributes {
            let Some(schema) = self.attributes.get(name) else {
                errors.log(Error::UnsupportedAttribute {
                    name: name.clone(),
                    range: attribute.range.clone(),
                });
                continue;
            };

            let value = match ctx.evaluate(&attribute.expr) {
                Ok(value) => value,
                Err(e) => {
                    errors.log(Error::evaluate(&attribute.range, e));
                    continue;
                }
            };

            match schema.constraint.convert(value) {
                // null behaves like an absent attribute
                Ok(Value::Null) => {}
                Ok(value) => {
                    object.insert(name.clone(), value);
                }
                Err(error) => errors.log(Error::AttributeType {
                    name: name.clone(),
                    range: attribute.range.clone(),
                    error,
                }),
            }
        }

        for schema in self.attributes.values() {
            if schema.required && !block.attributes.contains_key(&schema.name) {
                errors.log(Error::MissingAttribute {
                    name: schema.name.clone(),
                    range: block.range.clone(),
                });
            }
        }

        for nested in &block.blocks {
            let Some(schema) = self.blocks.get(&nested.block_type) else {
                errors.log(Error::UnsupportedBlock {
                    name: nested.block_type.clone(),
                    range: nested.range.clone(),
                });
                continue;
            };

            let value = match schema.schema().decode(nested, ctx) {
                Ok(value) => value,
                Err(nested_errors) => {
                    errors.absorb(nested_errors);
                    continue;
                }
            };

            if !schema.repeated {
                if object.contains_key(&schema.name) {
                    errors.log(Error::UnsupportedBlock {
                        name: format!("{} (only one block allowed)", schema.name),
                        range: nested.range.clone(),
                    });
                    continue;
                }
                object.insert(schema.name.clone(), value);
                continue;
            }

            if let Value::Array(values) = object
                .entry(schema.name.clone())
                .or_insert_with(|| Value::Array(vec![]))
            {
                values.push(value);
            }
        }

        errors.into_result()?;

        self.apply_defaults(&mut object);
        Ok(Value::Object(object))
    }
}
