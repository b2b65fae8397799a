//! evaluation context: named values plus functions
//!
//! A fresh [hcl::eval::Context] is assembled for each evaluation, so an [EvalContext] can be cloned
//! and extended (e.g. with `each` or a dynamic block iterator) without touching the context it was
//! derived from.
use crate::functions::Functions;
use hcl::eval::Evaluate;
use hcl::{Expression, Identifier, Value};

#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    variables: hcl::Map<String, Value>,
    functions: Functions,
}

impl EvalContext {
    pub fn new(functions: Functions) -> Self {
        Self {
            variables: Default::default(),
            functions,
        }
    }

    pub fn declare_var(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Derive a context with one more variable (shadows an existing one of the same name)
    pub fn with_var(&self, name: impl Into<String>, value: Value) -> Self {
        let mut child = self.clone();
        child.declare_var(name, value);
        child
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> &hcl::Map<String, Value> {
        &self.variables
    }

    pub fn functions(&self) -> &Functions {
        &self.functions
    }

    pub fn evaluate(&self, expr: &Expression) -> Result<Value, hcl::eval::Errors> {
        let mut context = hcl::eval::Context::new();
        for (name, value) in &self.variables {
            context.declare_var(Identifier::unchecked(name.as_str()), value.clone());
        }
        self.functions.declare(&mut context);

        expr.evaluate(&context).map_err(hcl::eval::Errors::from)
    }

    /// All variables as a single object
    pub fn to_value(&self) -> Value {
        Value::Object(self.variables.clone())
    }
}
