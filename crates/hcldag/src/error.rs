//! error types shared by loading, graph building and evaluation
use crate::source::SourceRange;
use crate::types::TypeError;
use std::path::PathBuf;
use std::sync::Arc;

/// A single problem found while loading or evaluating a configuration
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("root attributes are not supported: {name} {range}")]
    RootAttribute { name: String, range: SourceRange },
    #[error("invalid block type: {block_type} {range}")]
    UnknownBlockType {
        block_type: String,
        range: SourceRange,
    },
    #[error("unregistered {block_type}: {type_label} {range}")]
    UnregisteredKind {
        block_type: String,
        type_label: String,
        range: SourceRange,
    },
    #[error("`{block_type}` block expects {expected} label(s), got {actual} {range}")]
    LabelCount {
        block_type: String,
        expected: usize,
        actual: usize,
        range: SourceRange,
    },

    #[error("duplicate block address {address} {range}")]
    DuplicateAddress { address: String, range: SourceRange },
    #[error("unknown block address {0}")]
    UnknownAddress(String),
    #[error("cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("`depends_on` must be a list of block address {range}")]
    DependsOnNotList { range: SourceRange },
    #[error("`depends_on` must be a list of block address, invalid address: {element} {range}")]
    DependsOnInvalidAddress { element: String, range: SourceRange },

    #[error("{range}: {message}")]
    Evaluate { range: SourceRange, message: String },
    #[error("invalid `for_each`, expect set or map, got {got}: {range}")]
    ForEachNotIterable { got: &'static str, range: SourceRange },
    #[error("`dynamic` block must have `for_each` attribute {range}")]
    DynamicWithoutForEach { range: SourceRange },
    #[error("`dynamic` block must have exactly one label {range}")]
    DynamicLabel { range: SourceRange },
    #[error("`dynamic` block should contain `content` block only {range}")]
    DynamicContent { range: SourceRange },

    #[error("unsupported argument `{name}` {range}")]
    UnsupportedAttribute { name: String, range: SourceRange },
    #[error("unsupported block type `{name}` {range}")]
    UnsupportedBlock { name: String, range: SourceRange },
    #[error("missing required argument `{name}` {range}")]
    MissingAttribute { name: String, range: SourceRange },
    #[error("incorrect type for `{name}` {range}: {error}")]
    AttributeType {
        name: String,
        range: SourceRange,
        error: TypeError,
    },
    #[error("cannot populate block fields: {0}")]
    Fields(#[from] serde_json::Error),
    #[error("precondition failed {range}\n{message}")]
    Precondition { range: SourceRange, message: String },

    #[error("incompatible type for var.{name}, want {want}, got {got}")]
    VariableType {
        name: String,
        want: String,
        got: String,
    },
    #[error("invalid value for variable {name}\n{range}\n{message}")]
    Validation {
        name: String,
        range: SourceRange,
        message: String,
    },
    #[error("invalid value for var.{name}: {message}")]
    VariableValue { name: String, message: String },
    #[error("incorrect type for `description` {range}, got {got}, want string")]
    DescriptionType { range: SourceRange, got: &'static str },
    #[error("cannot evaluate value for var.{0}")]
    NoVariableValue(String),
    #[error(
        "a variable named \"{0}\" was assigned on the command line, but cannot find a variable \
         of that name. To use this value, add a \"variable\" block to the configuration"
    )]
    UnknownVariable(String),
    #[error("cannot read {path}: {error}")]
    VarFileIo { path: PathBuf, error: std::io::Error },
    #[error("cannot parse {path}: {message}")]
    VarFileParse { path: PathBuf, message: String },
    #[error("cannot read value for var.{name}: {error}")]
    Prompt { name: String, error: std::io::Error },
    #[error("{0}")]
    InputVariables(Arc<Error>),

    /// the cause is part of the message, so printing a chain does not repeat it
    #[error("{address}: {error}")]
    Block { address: String, error: Box<Error> },
    #[error("{0}")]
    Aggregate(Errors),
}

impl Error {
    pub(crate) fn evaluate(range: &SourceRange, message: impl std::fmt::Display) -> Self {
        Error::Evaluate {
            range: range.clone(),
            message: message.to_string(),
        }
    }

    pub(crate) fn in_block(self, address: impl Into<String>) -> Self {
        Error::Block {
            address: address.into(),
            error: Box::new(self),
        }
    }
}

/// Every problem found during one load or one graph pass
#[derive(Debug, Default)]
pub struct Errors {
    errors: Vec<Error>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, error: Error) {
        tracing::trace!(%error, "issue found");
        self.errors.push(error);
    }

    pub fn absorb(&mut self, errors: Errors) {
        for error in errors.errors {
            self.log(error);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter()
    }

    /// `Ok` when nothing was logged
    pub fn into_result(self) -> Result<(), Errors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Collapse into a single [Error], unwrapping a lone cause
    pub fn into_error(mut self) -> Error {
        if self.errors.len() == 1 {
            return self.errors.remove(0);
        }
        Error::Aggregate(self)
    }
}

impl From<Error> for Errors {
    fn from(error: Error) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl std::error::Error for Errors {}

impl std::fmt::Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_lists_every_cause() {
        let mut errors = Errors::new();
        errors.log(Error::UnknownAddress("data.a.b".into()));
        errors.log(Error::Cycle {
            path: vec!["local.a".into(), "local.b".into(), "local.a".into()],
        });

        assert_eq!(
            errors.to_string(),
            "unknown block address data.a.b\ncycle detected: local.a -> local.b -> local.a"
        );
    }

    #[test]
    fn block_errors_print_their_cause_once() {
        use std::error::Error as _;

        let error = Error::UnknownAddress("data.a.b".into()).in_block("local.c");
        assert!(error.source().is_none());

        let chain = anyhow::Error::from(error)
            .chain()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        assert_eq!(chain, ["local.c: unknown block address data.a.b"]);
    }

    #[test]
    fn single_cause_is_unwrapped() {
        let errors = Errors::from(Error::UnknownAddress("x.y".into()));
        assert!(matches!(errors.into_error(), Error::UnknownAddress(_)));
    }
}
