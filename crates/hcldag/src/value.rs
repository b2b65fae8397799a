//! value representation
//!
//! Evaluated expressions are [hcl::Value]s:
//! - null
//! - boolean (true/false)
//! - number (integer or decimal, see [hcl::Number])
//! - string (utf-8)
//! - array ("list"/"set"/"tuple" of values)
//! - object (order-preserving "map"/"object", where the key is of type string)
//!
//! hcl has no distinct set type. `toset(..)` yields a de-duplicated array and a
//! block level `for_each` treats arrays as sets: every element is its own key.
//!
//! Typed block fields travel through [serde_json::Value] (see [to_json] and [from_json]) so
//! any `Serialize`/`Deserialize` struct can be populated from or turned back into a value.
use hcl::{Expression, Number, ObjectKey, Value};

/// Short type name used in error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// String form of a value when used as an instance key, e.g. `data.a.b[key]`
pub fn key_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_string(n),
        Value::String(s) => s.clone(),
        Value::Array(array) => {
            let elements: Vec<_> = array.iter().map(key_string).collect();
            format!("[{}]", elements.join(", "))
        }
        Value::Object(object) => {
            let entries: Vec<_> = object
                .iter()
                .map(|(k, v)| format!("{k}: {}", key_string(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

fn number_string(number: &Number) -> String {
    if let Some(int) = number.as_i64() {
        return int.to_string();
    }
    if let Some(float) = number.as_f64() {
        if float.fract() == 0.0 && float.abs() < 1e15 {
            return format!("{float:.0}");
        }
    }
    number.to_string()
}

/// How array elements are keyed when iterating a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKeys {
    /// every element is keyed by itself, duplicates collapse (block `for_each`)
    Elements,
    /// every element is keyed by its position (`dynamic` blocks)
    Indices,
}

/// Iterate a collection as `(key, value)` pairs
///
/// Returns `None` when the value can not be iterated.
///
/// There is no set value, `toset(..)` returns an array. With [ArrayKeys::Elements] every array is
/// treated as a set: elements are keyed by their [key_string], so `[1, "1"]` yields a single pair
/// keyed `1`.
pub fn elements(value: &Value, keys: ArrayKeys) -> Option<Vec<(Value, Value)>> {
    match value {
        Value::Array(array) => match keys {
            ArrayKeys::Indices => Some(
                array
                    .iter()
                    .enumerate()
                    .map(|(index, element)| (Value::from(index as u64), element.clone()))
                    .collect(),
            ),
            ArrayKeys::Elements => {
                let mut seen = std::collections::HashSet::new();
                Some(
                    array
                        .iter()
                        .filter(|element| seen.insert(key_string(element)))
                        .map(|element| (element.clone(), element.clone()))
                        .collect(),
                )
            }
        },
        Value::Object(object) => Some(
            object
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect(),
        ),
        _ => None,
    }
}

/// The `{ key = .., value = .. }` object bound to iterators (`each`, dynamic block labels)
pub fn iterator_object(key: Value, value: Value) -> Value {
    let mut object = hcl::Map::new();
    object.insert("key".to_string(), key);
    object.insert("value".to_string(), value);
    Value::Object(object)
}

/// Turn a value back into a literal expression
pub fn to_expression(value: Value) -> Expression {
    match value {
        Value::Null => Expression::Null,
        Value::Bool(b) => Expression::Bool(b),
        Value::Number(n) => Expression::Number(n),
        Value::String(s) => Expression::String(s),
        Value::Array(array) => Expression::Array(array.into_iter().map(to_expression).collect()),
        Value::Object(object) => Expression::Object(
            object
                .into_iter()
                .map(|(k, v)| (ObjectKey::Expression(Expression::String(k)), to_expression(v)))
                .collect(),
        ),
    }
}

pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => {
            if let Some(int) = n.as_i64() {
                return serde_json::Value::from(int);
            }
            if let Some(uint) = n.as_u64() {
                return serde_json::Value::from(uint);
            }
            n.as_f64()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null)
        }
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(array) => serde_json::Value::Array(array.iter().map(to_json).collect()),
        Value::Object(object) => serde_json::Value::Object(
            object
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
    }
}

pub fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(int) = n.as_i64() {
                return Value::Number(Number::from(int));
            }
            if let Some(uint) = n.as_u64() {
                return Value::Number(Number::from(uint));
            }
            n.as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(array) => Value::Array(array.into_iter().map(from_json).collect()),
        serde_json::Value::Object(object) => Value::Object(
            object
                .into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect(),
        ),
    }
}

/// Populate a typed structure from a value
pub fn deserialize<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(to_json(value))
}

/// Reflect a typed structure into a value
pub fn serialize<T: serde::Serialize>(data: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(data).map(from_json)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn array(items: &[&str]) -> Value {
        Value::Array(items.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn key_strings() {
        assert_eq!(key_string(&Value::from("a")), "a");
        assert_eq!(key_string(&Value::from(3u64)), "3");
        assert_eq!(key_string(&Value::Bool(true)), "true");
        assert_eq!(key_string(&array(&["a", "b"])), "[a, b]");
    }

    #[test]
    fn array_elements_are_their_own_keys() {
        let pairs = elements(&array(&["a", "b", "a"]), ArrayKeys::Elements).unwrap();
        let keys: Vec<_> = pairs.iter().map(|(k, _)| key_string(k)).collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn elements_with_the_same_key_collapse() {
        let mixed = Value::Array(vec![Value::from(1u64), Value::from("1")]);
        let pairs = elements(&mixed, ArrayKeys::Elements).unwrap();
        assert_eq!(pairs, [(Value::from(1u64), Value::from(1u64))]);
    }

    #[test]
    fn array_indices_as_keys() {
        let pairs = elements(&array(&["x", "y"]), ArrayKeys::Indices).unwrap();
        assert_eq!(pairs[1], (Value::from(1u64), Value::from("y")));
    }

    #[test]
    fn scalars_are_not_iterable() {
        assert!(elements(&Value::from("nope"), ArrayKeys::Elements).is_none());
        assert!(elements(&Value::Null, ArrayKeys::Indices).is_none());
    }

    #[test]
    fn typed_reflection() {
        #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq, Default)]
        #[serde(default)]
        struct Sample {
            name: String,
            count: i64,
            tags: Vec<String>,
        }

        let sample = Sample {
            name: "n".into(),
            count: 2,
            tags: vec!["t".into()],
        };

        let value = serialize(&sample).unwrap();
        assert_eq!(deserialize::<Sample>(&value).unwrap(), sample);
    }
}
