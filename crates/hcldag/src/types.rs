//! type constraints (`string`, `list(number)`, `object({ a = bool })`, ...)
//!
//! Constraints are read from the syntax of a `type = ...` expression, the expression itself is
//! never evaluated. [TypeConstraint::convert] applies the usual lenient conversions between
//! primitive types: numbers and booleans may become strings, strings may become numbers or booleans
//! when they parse.
use crate::value::{key_string, type_name};
use hcl::{Expression, ObjectKey, Value};
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TypeConstraint {
    #[default]
    Any,
    String,
    Number,
    Bool,
    List(Box<TypeConstraint>),
    Set(Box<TypeConstraint>),
    Map(Box<TypeConstraint>),
    Object(IndexMap<String, TypeConstraint>),
    Tuple(Vec<TypeConstraint>),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TypeError {
    #[error("want {want}, got {got}")]
    Mismatch { want: String, got: String },
    #[error("invalid type constraint: {0}")]
    Invalid(String),
}

impl TypeConstraint {
    /// Read a constraint from its expression form
    pub fn parse(expr: &Expression) -> Result<Self, TypeError> {
        match expr {
            Expression::Variable(variable) => match variable.as_str() {
                "any" => Ok(Self::Any),
                "string" => Ok(Self::String),
                "number" => Ok(Self::Number),
                "bool" => Ok(Self::Bool),
                other => Err(TypeError::Invalid(format!("unknown primitive type `{other}`"))),
            },
            Expression::FuncCall(call) => {
                let name = call.name.as_str();
                let [arg] = call.args.as_slice() else {
                    return Err(TypeError::Invalid(format!(
                        "`{name}` expects exactly one argument"
                    )));
                };

                match name {
                    "list" => Ok(Self::List(Box::new(Self::parse(arg)?))),
                    "set" => Ok(Self::Set(Box::new(Self::parse(arg)?))),
                    "map" => Ok(Self::Map(Box::new(Self::parse(arg)?))),
                    "object" => {
                        let Expression::Object(object) = arg else {
                            return Err(TypeError::Invalid(
                                "`object` expects an object of attribute types".into(),
                            ));
                        };
                        let mut attributes = IndexMap::new();
                        for (key, value) in object {
                            attributes.insert(object_key(key)?, Self::parse(value)?);
                        }
                        Ok(Self::Object(attributes))
                    }
                    "tuple" => {
                        let Expression::Array(elements) = arg else {
                            return Err(TypeError::Invalid(
                                "`tuple` expects a list of element types".into(),
                            ));
                        };
                        Ok(Self::Tuple(
                            elements.iter().map(Self::parse).collect::<Result<_, _>>()?,
                        ))
                    }
                    other => Err(TypeError::Invalid(format!("unknown type function `{other}`"))),
                }
            }
            Expression::Parenthesis(inner) => Self::parse(inner),
            other => Err(TypeError::Invalid(format!("{other:?}"))),
        }
    }

    /// Convert `value` so it satisfies the constraint
    ///
    /// `null` satisfies every constraint.
    pub fn convert(&self, value: Value) -> Result<Value, TypeError> {
        if value.is_null() {
            return Ok(value);
        }

        match (self, value) {
            (Self::Any, value) => Ok(value),

            (Self::String, Value::String(s)) => Ok(Value::String(s)),
            (Self::String, value @ (Value::Bool(_) | Value::Number(_))) => {
                Ok(Value::String(key_string(&value)))
            }

            (Self::Number, Value::Number(n)) => Ok(Value::Number(n)),
            (Self::Number, Value::String(s)) => {
                parse_number(&s).ok_or_else(|| self.mismatch_str("string"))
            }

            (Self::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (Self::Bool, Value::String(s)) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(self.mismatch_str("string")),
            },

            (Self::List(element), Value::Array(array)) => Ok(Value::Array(
                array
                    .into_iter()
                    .map(|v| element.convert(v))
                    .collect::<Result<_, _>>()?,
            )),
            (Self::Set(element), Value::Array(array)) => {
                let mut seen = std::collections::HashSet::new();
                let mut converted = Vec::with_capacity(array.len());
                for item in array {
                    let item = element.convert(item)?;
                    if seen.insert(key_string(&item)) {
                        converted.push(item);
                    }
                }
                Ok(Value::Array(converted))
            }
            (Self::Tuple(elements), Value::Array(array)) if elements.len() == array.len() => Ok(
                Value::Array(
                    elements
                        .iter()
                        .zip(array)
                        .map(|(t, v)| t.convert(v))
                        .collect::<Result<_, _>>()?,
                ),
            ),

            (Self::Map(element), Value::Object(object)) => Ok(Value::Object(
                object
                    .into_iter()
                    .map(|(k, v)| element.convert(v).map(|v| (k, v)))
                    .collect::<Result<_, _>>()?,
            )),
            (Self::Object(attributes), Value::Object(mut object)) => {
                let mut converted = hcl::Map::new();
                for (name, constraint) in attributes {
                    let Some(value) = object.swap_remove(name) else {
                        return Err(TypeError::Mismatch {
                            want: self.to_string(),
                            got: format!("object without attribute \"{name}\""),
                        });
                    };
                    converted.insert(name.clone(), constraint.convert(value)?);
                }
                Ok(Value::Object(converted))
            }

            (_, value) => Err(self.mismatch_str(type_name(&value))),
        }
    }

    fn mismatch_str(&self, got: &str) -> TypeError {
        TypeError::Mismatch {
            want: self.to_string(),
            got: got.to_string(),
        }
    }
}

fn object_key(key: &ObjectKey) -> Result<String, TypeError> {
    match key {
        ObjectKey::Identifier(ident) => Ok(ident.to_string()),
        ObjectKey::Expression(Expression::String(s)) => Ok(s.clone()),
        ObjectKey::Expression(Expression::Variable(v)) => Ok(v.to_string()),
        other => Err(TypeError::Invalid(format!("invalid attribute name {other:?}"))),
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(int) = s.parse::<i64>() {
        return Some(Value::from(int));
    }
    s.parse::<f64>()
        .ok()
        .and_then(hcl::Number::from_f64)
        .map(Value::Number)
}

impl std::fmt::Display for TypeConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Bool => f.write_str("bool"),
            Self::List(element) => write!(f, "list({element})"),
            Self::Set(element) => write!(f, "set({element})"),
            Self::Map(element) => write!(f, "map({element})"),
            Self::Object(attributes) => {
                f.write_str("object({")?;
                for (index, (name, constraint)) in attributes.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name} = {constraint}")?;
                }
                f.write_str("})")
            }
            Self::Tuple(elements) => {
                f.write_str("tuple([")?;
                for (index, constraint) in elements.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{constraint}")?;
                }
                f.write_str("])")
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn constraint(source: &str) -> TypeConstraint {
        let expr: hcl_edit::expr::Expression = source.parse().unwrap();
        TypeConstraint::parse(&expr.into()).unwrap()
    }

    #[test]
    fn parse_nested_constraints() {
        assert_eq!(constraint("string"), TypeConstraint::String);
        assert_eq!(
            constraint("list(number)"),
            TypeConstraint::List(Box::new(TypeConstraint::Number))
        );
        assert_eq!(
            constraint("object({ name = string, tags = map(string) })").to_string(),
            "object({name = string, tags = map(string)})"
        );
        assert_eq!(
            constraint("tuple([bool, any])").to_string(),
            "tuple([bool, any])"
        );
    }

    #[test]
    fn unknown_constraint_is_rejected() {
        let expr: hcl_edit::expr::Expression = "stringy".parse().unwrap();
        assert!(matches!(
            TypeConstraint::parse(&expr.into()),
            Err(TypeError::Invalid(_))
        ));
    }

    #[test]
    fn primitive_conversions() {
        assert_eq!(
            TypeConstraint::Number.convert(Value::from("42")).unwrap(),
            Value::from(42i64)
        );
        assert_eq!(
            TypeConstraint::String.convert(Value::from(7i64)).unwrap(),
            Value::from("7")
        );
        assert_eq!(
            TypeConstraint::Bool.convert(Value::from("true")).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            TypeConstraint::Number.convert(Value::from("abc")),
            Err(TypeError::Mismatch {
                want: "number".into(),
                got: "string".into()
            })
        );
    }

    #[test]
    fn null_satisfies_everything() {
        assert_eq!(
            constraint("map(number)").convert(Value::Null).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn set_conversion_deduplicates() {
        let value = Value::Array(vec![Value::from("a"), Value::from("a"), Value::from("b")]);
        assert_eq!(
            constraint("set(string)").convert(value).unwrap(),
            Value::Array(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn collection_mismatch() {
        let error = constraint("list(string)")
            .convert(Value::from("x"))
            .unwrap_err();
        assert_eq!(error.to_string(), "want list(string), got string");
    }
}
