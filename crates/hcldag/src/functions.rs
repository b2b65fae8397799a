//! function library injected into every evaluation context
use crate::value::{key_string, type_name};
use hcl::eval::{FuncArgs, FuncDef, ParamType};
use hcl::{Identifier, Value};
use indexmap::IndexMap;

pub type Func = hcl::eval::Func;

#[derive(Debug, Clone, Copy)]
struct FunctionEntry {
    params: usize,
    variadic: bool,
    func: Func,
}

/// Named functions available to expressions
///
/// Callers can add their own or replace a builtin by registering under the same name.
#[derive(Debug, Clone, Default)]
pub struct Functions {
    entries: IndexMap<String, FunctionEntry>,
}

impl Functions {
    pub fn builtin() -> Self {
        let mut functions = Self::default();
        functions.register("toset", 1, false, toset);
        functions.register("tolist", 1, false, tolist);
        functions.register("length", 1, false, length);
        functions.register("merge", 0, true, merge);
        functions.register("range", 1, true, range);
        functions.register("trim", 2, false, trim);
        functions.register("startswith", 2, false, startswith);
        functions.register("endswith", 2, false, endswith);
        functions.register("upper", 1, false, upper);
        functions.register("lower", 1, false, lower);
        functions.register("keys", 1, false, keys);
        functions.register("values", 1, false, values);
        functions.register("concat", 0, true, concat);
        functions.register("contains", 2, false, contains);
        functions
    }

    /// Register a function taking `params` positional arguments (plus any number of extra ones if
    /// `variadic`)
    pub fn register(&mut self, name: impl Into<String>, params: usize, variadic: bool, func: Func) {
        self.entries.insert(
            name.into(),
            FunctionEntry {
                params,
                variadic,
                func,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn declare(&self, context: &mut hcl::eval::Context) {
        for (name, entry) in &self.entries {
            let mut builder = FuncDef::builder();
            for _ in 0..entry.params {
                builder = builder.param(ParamType::Any);
            }
            if entry.variadic {
                builder = builder.variadic_param(ParamType::Any);
            }
            context.declare_func(Identifier::unchecked(name.as_str()), builder.build(entry.func));
        }
    }
}

fn array<'v>(function: &str, value: &'v Value) -> Result<&'v Vec<Value>, String> {
    match value {
        Value::Array(array) => Ok(array),
        other => Err(format!(
            "{function}: expected list, got {}",
            type_name(other)
        )),
    }
}

fn object<'v>(function: &str, value: &'v Value) -> Result<&'v hcl::Map<String, Value>, String> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(format!(
            "{function}: expected object, got {}",
            type_name(other)
        )),
    }
}

fn string<'v>(function: &str, value: &'v Value) -> Result<&'v str, String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(format!(
            "{function}: expected string, got {}",
            type_name(other)
        )),
    }
}

fn number(function: &str, value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{function}: number out of range")),
        other => Err(format!(
            "{function}: expected number, got {}",
            type_name(other)
        )),
    }
}

fn toset(args: FuncArgs) -> Result<Value, String> {
    let mut seen = std::collections::HashSet::new();
    let elements = array("toset", &args[0])?
        .iter()
        .filter(|element| seen.insert(key_string(element)))
        .cloned()
        .collect();
    Ok(Value::Array(elements))
}

fn tolist(args: FuncArgs) -> Result<Value, String> {
    Ok(Value::Array(array("tolist", &args[0])?.clone()))
}

fn length(args: FuncArgs) -> Result<Value, String> {
    let length = match &args[0] {
        Value::Array(array) => array.len(),
        Value::Object(object) => object.len(),
        Value::String(s) => s.chars().count(),
        other => return Err(format!("length: cannot measure {}", type_name(other))),
    };
    Ok(Value::from(length as u64))
}

fn merge(args: FuncArgs) -> Result<Value, String> {
    let mut merged = hcl::Map::new();
    for arg in args.iter() {
        if arg.is_null() {
            continue;
        }
        for (key, value) in object("merge", arg)? {
            merged.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::Object(merged))
}

fn range(args: FuncArgs) -> Result<Value, String> {
    let numbers = args
        .iter()
        .map(|arg| number("range", arg))
        .collect::<Result<Vec<_>, _>>()?;

    let (start, end, step) = match numbers.as_slice() {
        [end] => (0.0, *end, 1.0),
        [start, end] => (*start, *end, if start <= end { 1.0 } else { -1.0 }),
        [start, end, step] => (*start, *end, *step),
        _ => return Err("range: expects 1 to 3 arguments".to_string()),
    };

    if step == 0.0 {
        return Err("range: step must not be zero".to_string());
    }

    let mut elements = vec![];
    let mut current = start;
    while (step > 0.0 && current < end) || (step < 0.0 && current > end) {
        let number = hcl::Number::from_f64(current)
            .ok_or_else(|| "range: invalid number".to_string())?;
        elements.push(Value::Number(number));
        current += step;
    }
    Ok(Value::Array(elements))
}

fn trim(args: FuncArgs) -> Result<Value, String> {
    let text = string("trim", &args[0])?;
    let cutset: Vec<char> = string("trim", &args[1])?.chars().collect();
    Ok(Value::from(text.trim_matches(cutset.as_slice())))
}

fn startswith(args: FuncArgs) -> Result<Value, String> {
    let text = string("startswith", &args[0])?;
    Ok(Value::Bool(text.starts_with(string("startswith", &args[1])?)))
}

fn endswith(args: FuncArgs) -> Result<Value, String> {
    let text = string("endswith", &args[0])?;
    Ok(Value::Bool(text.ends_with(string("endswith", &args[1])?)))
}

fn upper(args: FuncArgs) -> Result<Value, String> {
    Ok(Value::from(string("upper", &args[0])?.to_uppercase()))
}

fn lower(args: FuncArgs) -> Result<Value, String> {
    Ok(Value::from(string("lower", &args[0])?.to_lowercase()))
}

fn keys(args: FuncArgs) -> Result<Value, String> {
    Ok(Value::Array(
        object("keys", &args[0])?
            .keys()
            .map(|k| Value::from(k.as_str()))
            .collect(),
    ))
}

fn values(args: FuncArgs) -> Result<Value, String> {
    Ok(Value::Array(
        object("values", &args[0])?.values().cloned().collect(),
    ))
}

fn concat(args: FuncArgs) -> Result<Value, String> {
    let mut elements = vec![];
    for arg in args.iter() {
        elements.extend(array("concat", arg)?.iter().cloned());
    }
    Ok(Value::Array(elements))
}

fn contains(args: FuncArgs) -> Result<Value, String> {
    Ok(Value::Bool(array("contains", &args[0])?.contains(&args[1])))
}
