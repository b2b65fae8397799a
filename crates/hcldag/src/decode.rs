//! turning a raw block into the typed fields of its instance
//!
//! The standard pipeline, for blocks without [CustomDecode](crate::block::CustomDecode):
//! 1. `depends_on` must be a literal list of known block addresses
//! 2. `each` is bound for expanded instances
//! 3. typed fields are reset to the schema defaults
//! 4. `dynamic` nested blocks are expanded
//! 5. the body (meta attributes and meta blocks removed) is decoded against the schema and loaded
//! 6. [BaseDecode](crate::block::BaseDecode) fills in what the schema does not describe
//! 7. `precondition` blocks are checked
//!
//! Decoding twice with the same context gives the same result.
use crate::block::Block;
use crate::error::{Error, Errors};
use crate::eval::EvalContext;
use crate::raw_block::RawBlock;
use crate::schema::BlockSchema;
use crate::types::TypeConstraint;
use crate::util::TraversalExt;
use hcl::{Expression, Value};

/// Decode `block` after checking its `depends_on` against `valid_address`
pub fn decode(
    block: &mut dyn Block,
    ctx: &EvalContext,
    valid_address: impl Fn(&str) -> bool,
) -> Result<(), Error> {
    verify_depends_on(block.base().raw(), valid_address)?;
    decode_verified(block, ctx)
}

/// `depends_on = [data.a.b, resource.c.d]`, only plain addresses are accepted
pub fn verify_depends_on(
    raw: &RawBlock,
    valid_address: impl Fn(&str) -> bool,
) -> Result<(), Error> {
    let Some(depends_on) = raw.attribute("depends_on") else {
        return Ok(());
    };

    let Expression::Array(elements) = &depends_on.expr else {
        return Err(Error::DependsOnNotList {
            range: depends_on.range.clone(),
        });
    };

    for element in elements {
        let address = match element {
            Expression::Traversal(traversal) => traversal.as_address(),
            _ => None,
        };

        match address {
            Some(address) if valid_address(&address) => {}
            _ => {
                return Err(Error::DependsOnInvalidAddress {
                    element: hcl::format::to_string(element)
                        .unwrap_or_else(|_| format!("{element:?}")),
                    range: depends_on.range.clone(),
                })
            }
        }
    }

    Ok(())
}

/// Decode without looking at `depends_on`
#[tracing::instrument(level = "debug", skip_all, fields(address = %block.base().address()))]
pub fn decode_verified(block: &mut dyn Block, ctx: &EvalContext) -> Result<(), Error> {
    let ctx = block.base().bind_each(ctx);
    let raw = block.base().raw().clone();

    if let Some(custom) = block.as_custom_decode() {
        return custom.decode(&raw, &ctx);
    }

    let schema = block.base().schema().clone();
    block.load(&schema.defaults())?;

    let expanded = raw.expand_dynamic_blocks(&ctx)?;
    let value = schema
        .decode(&expanded.without_meta(), &ctx)
        .map_err(Errors::into_error)?;
    block.load(&value)?;

    if let Some(base) = block.as_base_decode() {
        base.base_decode(&raw, &ctx)?;
    }

    check_preconditions(&expanded, &ctx)
}

fn precondition_schema() -> BlockSchema {
    BlockSchema::new()
        .required_attribute("condition", TypeConstraint::Bool)
        .required_attribute("error_message", TypeConstraint::String)
}

fn check_preconditions(raw: &RawBlock, ctx: &EvalContext) -> Result<(), Error> {
    let mut errors = Errors::new();

    for precondition in raw.nested_blocks("precondition") {
        let value = match precondition_schema().decode(precondition, ctx) {
            Ok(value) => value,
            Err(e) => {
                errors.absorb(e);
                continue;
            }
        };

        let Value::Object(object) = value else {
            continue;
        };
        if object.get("condition") == Some(&Value::Bool(false)) {
            let message = match object.get("error_message") {
                Some(Value::String(message)) => message.clone(),
                _ => String::new(),
            };
            errors.log(Error::Precondition {
                range: precondition.range.clone(),
                message,
            });
        }
    }

    errors.into_result().map_err(Errors::into_error)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::{BaseBlock, BaseDecode, BlockKind};
    use crate::functions::Functions;
    use crate::raw_block::ForEach;
    use crate::registry::BlockRegistry;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Rule {
        port: u16,
        #[serde(default)]
        protocol: String,
    }

    fn rule_schema() -> BlockSchema {
        BlockSchema::new()
            .required_attribute("port", TypeConstraint::Number)
            .attribute_with_default("protocol", TypeConstraint::String, "tcp")
    }

    #[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
    #[serde(default)]
    struct Firewall {
        #[serde(skip)]
        base: BaseBlock,
        name: String,
        zone: String,
        rule: Vec<Rule>,
        #[serde(skip)]
        label_count: usize,
    }

    impl BlockKind for Firewall {
        const BLOCK_TYPE: &'static str = "resource";
        const TYPE_LABEL: &'static str = "firewall";

        fn schema() -> BlockSchema {
            BlockSchema::new()
                .attribute("name", TypeConstraint::String)
                .attribute_with_default("zone", TypeConstraint::String, "public")
                .blocks("rule", rule_schema)
        }
        fn base(&self) -> &BaseBlock {
            &self.base
        }
        fn base_mut(&mut self) -> &mut BaseBlock {
            &mut self.base
        }
    }

    impl Block for Firewall {
        fn as_base_decode(&mut self) -> Option<&mut dyn BaseDecode> {
            Some(self)
        }
    }

    impl BaseDecode for Firewall {
        fn base_decode(&mut self, raw: &RawBlock, _ctx: &EvalContext) -> Result<(), Error> {
            self.label_count = raw.labels.len();
            if self.name.is_empty() {
                self.name = raw.name().to_string();
            }
            Ok(())
        }
    }

    fn firewall(source: &str) -> Box<dyn Block> {
        let body = hcl_edit::parser::parse_body(source).unwrap();
        let raw = RawBlock::from_edit(body.blocks().next().unwrap(), None, source);
        let mut registry = BlockRegistry::new();
        registry.register::<Firewall>();
        registry.construct(raw).unwrap()
    }

    fn ctx() -> EvalContext {
        EvalContext::new(Functions::builtin())
    }

    fn typed(block: &dyn Block) -> &Firewall {
        block.as_any().downcast_ref::<Firewall>().unwrap()
    }

    #[test]
    fn defaults_nested_and_dynamic_blocks() {
        let mut block = firewall(
            r#"
            resource "firewall" "web" {
              name = "web"
              rule { port = 22 }
              dynamic "rule" {
                for_each = [80, 443]
                content {
                  port     = rule.value
                  protocol = "http${rule.key}"
                }
              }
            }
            "#,
        );

        decode(block.as_mut(), &ctx(), |_| true).unwrap();
        let firewall = typed(block.as_ref());

        assert_eq!(firewall.zone, "public");
        assert_eq!(firewall.label_count, 2);
        assert_eq!(
            firewall.rule,
            [
                Rule { port: 22, protocol: "tcp".into() },
                Rule { port: 80, protocol: "http0".into() },
                Rule { port: 443, protocol: "http1".into() },
            ]
        );
    }

    #[test]
    fn base_decode_sees_decoded_fields() {
        let mut named = firewall(r#"resource "firewall" "web" { name = "edge" }"#);
        decode(named.as_mut(), &ctx(), |_| true).unwrap();
        assert_eq!(typed(named.as_ref()).name, "edge");

        let mut unnamed = firewall(r#"resource "firewall" "web" {}"#);
        decode(unnamed.as_mut(), &ctx(), |_| true).unwrap();
        assert_eq!(typed(unnamed.as_ref()).name, "web");
        assert_eq!(typed(unnamed.as_ref()).label_count, 2);
    }

    #[test]
    fn decoding_twice_gives_the_same_result() {
        let mut block = firewall(
            r#"
            resource "firewall" "web" {
              rule { port = 1 }
            }
            "#,
        );

        decode(block.as_mut(), &ctx(), |_| true).unwrap();
        let first = block.to_value().unwrap();
        decode(block.as_mut(), &ctx(), |_| true).unwrap();

        assert_eq!(block.to_value().unwrap(), first);
        assert_eq!(typed(block.as_ref()).rule.len(), 1);
    }

    #[test]
    fn each_is_bound_for_expanded_instances() {
        let source = r#"
            resource "firewall" "web" {
              for_each = ["a"]
              name     = "${each.key}-${each.value}"
            }
            "#;
        let body = hcl_edit::parser::parse_body(source).unwrap();
        let raw = RawBlock::from_edit(body.blocks().next().unwrap(), None, source)
            .with_for_each(ForEach::new(Value::from("k"), Value::from("v")));
        let mut registry = BlockRegistry::new();
        registry.register::<Firewall>();
        let mut block = registry.construct(raw).unwrap();

        decode(block.as_mut(), &ctx(), |_| true).unwrap();
        assert_eq!(typed(block.as_ref()).name, "k-v");
    }

    #[test]
    fn depends_on_must_list_known_addresses() {
        let mut block = firewall(
            r#"
            resource "firewall" "web" {
              depends_on = [data.a.b, local.x]
            }
            "#,
        );
        assert!(decode(block.as_mut(), &ctx(), |_| true).is_ok());

        let error = decode(block.as_mut(), &ctx(), |address| address == "data.a.b").unwrap_err();
        let Error::DependsOnInvalidAddress { element, .. } = error else {
            panic!("expected an invalid address, got {error}");
        };
        assert_eq!(element, "local.x");

        let mut block = firewall(r#"resource "firewall" "web" { depends_on = "data.a.b" }"#);
        let error = decode(block.as_mut(), &ctx(), |_| true).unwrap_err();
        assert!(matches!(error, Error::DependsOnNotList { .. }));
    }

    #[test]
    fn failed_precondition() {
        let mut block = firewall(
            r#"
            resource "firewall" "web" {
              name = "x"
              precondition {
                condition     = length("x") > 1
                error_message = "name too short"
              }
            }
            "#,
        );

        let error = decode(block.as_mut(), &ctx(), |_| true).unwrap_err();
        let Error::Precondition { message, .. } = &error else {
            panic!("expected a failed precondition, got {error}");
        };
        assert_eq!(message, "name too short");
    }

    #[test]
    fn unsupported_attribute() {
        let mut block = firewall(r#"resource "firewall" "web" { colour = "red" }"#);
        let error = decode(block.as_mut(), &ctx(), |_| true).unwrap_err();
        assert!(matches!(error, Error::UnsupportedAttribute { name, .. } if name == "colour"));
    }
}
