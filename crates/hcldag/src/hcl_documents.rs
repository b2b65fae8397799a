//! collection of hcl documents (parsed [Body], source text and path)
//!
//! [HclDocuments] tracks
//! - the source path and text (for line/column information in errors)
//! - the root blocks
//! - the root attributes
//!
//! and turns the root blocks into [RawBlock]s. Root attributes are not allowed, and every attribute
//! of a `locals { .. }` block becomes a block of its own (`local` with the attribute name as its
//! label).
use crate::error::{Error, Errors};
use crate::raw_block::RawBlock;
use crate::source::SourceRange;
use crate::util::expression_from_edit;
use hcl_edit::structure::{Attribute, Block, Body, Structure};
use hcl_edit::Span;
use std::path::{Path, PathBuf};

#[derive(Default, Debug)]
pub struct HclDocuments {
    sources: Vec<Source>,
    root_attributes: Vec<(usize, Attribute)>,
    root_blocks: Vec<(usize, Block)>,
}

#[derive(Debug)]
pub struct Source {
    pub path: Option<PathBuf>,
    pub text: String,
}

impl HclDocuments {
    /// Parses and indexes an hcl document
    pub fn insert(
        &mut self,
        text: impl Into<String>,
        path: impl Into<Option<PathBuf>>,
    ) -> Result<(), hcl_edit::parser::Error> {
        let text = text.into();
        let document: Body = hcl_edit::parser::parse_body(&text)?;

        let source_index = self.sources.len();
        self.sources.push(Source {
            path: path.into(),
            text,
        });

        for structure in document.into_iter() {
            match structure {
                Structure::Block(block) => self.root_blocks.push((source_index, block)),
                Structure::Attribute(attribute) => {
                    self.root_attributes.push((source_index, attribute))
                }
            }
        }

        Ok(())
    }

    pub fn attributes(&self) -> impl Iterator<Item = SourceAttribute> {
        self.root_attributes
            .iter()
            .map(|(source_index, attribute)| (&self.sources[*source_index], attribute))
    }

    pub fn blocks(&self) -> impl Iterator<Item = SourceBlock> {
        self.root_blocks
            .iter()
            .map(|(source_index, block)| (&self.sources[*source_index], block))
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// All root blocks in source order, `locals` split into one `local` per attribute
    pub fn raw_blocks(&self) -> Result<Vec<RawBlock>, Errors> {
        let mut errors = Errors::new();

        for (source, attribute) in self.attributes() {
            errors.log(Error::RootAttribute {
                name: attribute.key.value().to_string(),
                range: source.range(attribute.span()),
            });
        }

        let mut raw_blocks = vec![];
        for (source, block) in self.blocks() {
            if block.ident.value().as_str() != "locals" {
                raw_blocks.push(RawBlock::from_edit(block, source.path.as_deref(), &source.text));
                continue;
            }

            for attribute in block.body.attributes() {
                let name = attribute.key.value().to_string();
                let range = source.range(attribute.span());
                let mut local = RawBlock::new("local", vec![name], range.clone());
                let expr = expression_from_edit(attribute.value.clone());
                local.insert_attribute("value", expr, range);
                raw_blocks.push(local);
            }

            for nested in block.body.blocks() {
                errors.log(Error::UnsupportedBlock {
                    name: nested.ident.value().to_string(),
                    range: source.range(nested.span()),
                });
            }
        }

        errors.into_result()?;
        Ok(raw_blocks)
    }
}

impl Source {
    pub fn range(&self, span: Option<std::ops::Range<usize>>) -> SourceRange {
        SourceRange::new(self.path.clone(), &self.text, span)
    }
}

impl HclDocuments {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize().map_err(|source| LoadError::Io {
            path: file_path.to_path_buf(),
            source,
        })?;
        tracing::info!(path=%file_path.display(), "loading file");

        let file_contents = std::fs::read_to_string(&file_path).map_err(|source| LoadError::Io {
            path: file_path.clone(),
            source,
        })?;

        self.insert(file_contents, Some(file_path.clone()))
            .map_err(|source| LoadError::HclParseFailed {
                path: file_path,
                source,
            })
    }

    /// Loads every `*.hcl` file of a directory (sorted by file name)
    pub fn load_directory(&mut self, dir_path: &Path) -> Result<(), LoadError> {
        let io_error = |source| LoadError::Io {
            path: dir_path.to_path_buf(),
            source,
        };

        let mut file_paths = vec![];
        for dir_entry in std::fs::read_dir(dir_path).map_err(io_error)? {
            let dir_entry = dir_entry.map_err(io_error)?;
            if !dir_entry.file_type().map_err(io_error)?.is_file() {
                continue;
            }

            let is_hcl_file = dir_entry.file_name().to_string_lossy().ends_with(".hcl");
            if !is_hcl_file {
                continue;
            }

            file_paths.push(dir_entry.path());
        }

        if file_paths.is_empty() {
            return Err(LoadError::NoFilesFound(dir_path.to_path_buf()));
        }

        file_paths.sort();
        for file_path in file_paths {
            self.load_file(&file_path)?;
        }

        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("no files found in directory {}", .0.display())]
    NoFilesFound(PathBuf),
    #[error("cannot read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse hcl file {}", .path.display())]
    HclParseFailed {
        path: PathBuf,
        #[source]
        source: hcl_edit::parser::Error,
    },
}

/// Utility macro to create [HclDocuments]
///
/// Create from a single document
/// ```
/// # use hcldag::hcl_documents;
/// hcl_documents!(r#"locals { attribute = 42 }"#);
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use hcldag::hcl_documents;
/// hcl_documents! {
///   "one.hcl" => "locals { one = 1 }",
///   "two.hcl" => "locals { two = 2 }"
/// };
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use hcldag::hcl_documents;
/// hcl_documents!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! hcl_documents {
    // single document without source
    { $expr:expr } => {{
        let mut docs = $crate::hcl_documents::HclDocuments::default();
        docs.insert($expr, None).expect("body must parse");
        docs
    }};
    // multi document with sources
    { $($source:expr => $expr:expr),+ $(,)? } => {{
        let mut docs = $crate::hcl_documents::HclDocuments::default();
        $(
            docs.insert($expr, Some(::std::path::PathBuf::from($source))).expect("body must parse");
        )+

        docs
    }};
}

pub type SourceAttribute<'a> = (&'a Source, &'a Attribute);
pub type SourceBlock<'a> = (&'a Source, &'a Block);

#[cfg(test)]
pub(crate) mod test {
    use pretty_assertions::assert_eq;

    #[test]
    fn iterators() {
        let hcl_documents = hcl_documents! {r#"
        attr_1 = 1
        one two {}
        three four five {}
        attr_2 = 2
        attr_3 = 3
        "#};

        assert_eq!(hcl_documents.attributes().count(), 3);
        assert_eq!(hcl_documents.blocks().count(), 2);
    }

    #[test]
    fn root_attributes_are_rejected() {
        let hcl_documents = hcl_documents! {"main.hcl" => "root_attr = 1"};
        let errors = hcl_documents.raw_blocks().unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(errors
            .to_string()
            .starts_with("root attributes are not supported: root_attr main.hcl:1,1"));
    }

    #[test]
    fn locals_are_split() {
        let hcl_documents = hcl_documents! {r#"
        locals {
          a = 1
          b = local.a + 1
        }
        data "dummy" "foo" {}
        "#};

        let blocks = hcl_documents.raw_blocks().unwrap();
        let addresses: Vec<_> = blocks
            .iter()
            .map(|block| block.address(&block.block_type))
            .collect();

        assert_eq!(addresses, ["local.a", "local.b", "data.dummy.foo"]);
        assert!(blocks[1].attribute("value").is_some());
    }

    #[test]
    fn multiple_sources() {
        let hcl_documents = hcl_documents! {
            "one.hcl" => "locals { one = 1 }",
            "two.hcl" => "locals { two = 2 }",
        };

        assert_eq!(hcl_documents.source_count(), 2);
        assert_eq!(hcl_documents.raw_blocks().unwrap().len(), 2);
    }
}
