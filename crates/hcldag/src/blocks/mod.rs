//! built-in block kinds
mod local;
mod variable;

pub use local::LocalBlock;
pub use variable::{VariableBlock, VariableValidation};
