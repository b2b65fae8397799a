//! input variable values from the environment, variable files and command line assignments
//!
//! Sources are merged in ascending precedence:
//! 1. environment `<ABBR>_VAR_<name>`
//! 2. default variable files `<full>.<abbr>vars` and `<full>.<abbr>vars.json`
//! 3. auto variable files `*.auto.<abbr>vars` and `*.auto.<abbr>vars.json` (sorted by file name)
//! 4. command line assignments, in the order they were given
//!
//! The merge runs once per configuration, on first use.
use crate::error::Error;
use crate::eval::EvalContext;
use crate::util::expression_from_edit;
use hcl::eval::ErrorKind;
use hcl::Value;
use indexmap::IndexMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Assignment given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAssignment {
    /// `--var name=value`
    Variable { name: String, raw: String },
    /// `--var-file path`
    VarFile(PathBuf),
}

impl CliAssignment {
    /// Parse `name=value`
    pub fn parse_variable(assignment: &str) -> Option<Self> {
        let (name, raw) = assignment.split_once('=')?;
        Some(Self::Variable {
            name: name.trim().to_string(),
            raw: raw.to_string(),
        })
    }
}

/// A value read for a variable, or the reason it could not be read
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRead {
    pub name: String,
    pub value: Result<Value, String>,
}

pub type VariableReads = IndexMap<String, VariableRead>;

/// Asks the user for a value of a variable nothing else assigned
pub trait Prompter: Send + Sync + std::fmt::Debug {
    fn prompt(&self, name: &str, description: Option<&str>) -> std::io::Result<String>;
}

/// Prompts on stdout and reads a single line from stdin
#[derive(Debug, Default)]
pub struct StdinPrompter;

static PROMPT_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

impl Prompter for StdinPrompter {
    fn prompt(&self, name: &str, description: Option<&str>) -> std::io::Result<String> {
        let _guard = PROMPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "var.{name}")?;
        if let Some(description) = description {
            writeln!(stdout, "  {description}\n")?;
        }
        write!(stdout, "  Enter a value: ")?;
        stdout.flush()?;

        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        writeln!(stdout)?;

        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Where variable values are looked up
#[derive(Debug, Clone, Default)]
pub struct VariableSources {
    pub basedir: PathBuf,
    pub var_config_dir: Option<PathBuf>,
    pub dsl_full_name: String,
    pub dsl_abbreviation: String,
    pub assignments: Vec<CliAssignment>,
    pub ignore_unknown_variables: bool,
}

impl VariableSources {
    fn var_files_dir(&self) -> &Path {
        self.var_config_dir.as_deref().unwrap_or(&self.basedir)
    }

    fn hcl_extension(&self) -> String {
        format!("{}vars", self.dsl_abbreviation)
    }

    fn env_name(&self, variable: &str) -> String {
        format!("{}_VAR_{variable}", self.dsl_abbreviation.to_uppercase())
    }
}

/// Single-flight loader of the merged input variables
#[derive(Debug)]
pub struct InputVariables {
    sources: VariableSources,
    /// names of all declared variables
    declared: Vec<String>,
    reads: OnceLock<Result<Arc<VariableReads>, Arc<Error>>>,
    prompter: Option<Arc<dyn Prompter>>,
}

impl InputVariables {
    pub fn new(
        sources: VariableSources,
        declared: Vec<String>,
        prompter: Option<Arc<dyn Prompter>>,
    ) -> Self {
        Self {
            sources,
            declared,
            reads: OnceLock::new(),
            prompter,
        }
    }

    /// Merged reads of all sources
    ///
    /// The first caller performs the merge, everybody (on any thread) gets the same result or the
    /// same error.
    pub fn read(&self) -> Result<Arc<VariableReads>, Error> {
        self.reads
            .get_or_init(|| {
                tracing::debug!("reading input variables");
                self.merge().map(Arc::new).map_err(Arc::new)
            })
            .clone()
            .map_err(Error::InputVariables)
    }

    /// Ask for a value, `None` if no prompter is configured
    pub fn prompt(&self, name: &str, description: Option<&str>) -> Result<Option<String>, Error> {
        let Some(prompter) = &self.prompter else {
            return Ok(None);
        };

        prompter
            .prompt(name, description)
            .map(Some)
            .map_err(|error| Error::Prompt {
                name: name.to_string(),
                error,
            })
    }

    fn merge(&self) -> Result<VariableReads, Error> {
        let mut reads = self.read_env();
        reads.extend(self.read_default_var_files()?);
        reads.extend(self.read_auto_var_files()?);
        reads.extend(self.read_cli_assignments()?);
        Ok(reads)
    }

    fn read_env(&self) -> VariableReads {
        let mut reads = VariableReads::new();
        for name in &self.declared {
            let Ok(raw) = std::env::var(self.sources.env_name(name)) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }

            tracing::trace!(variable = %name, "value from environment");
            reads.insert(name.clone(), read_raw(name, &raw));
        }
        reads
    }

    fn read_default_var_files(&self) -> Result<VariableReads, Error> {
        let hcl_file = self.sources.var_files_dir().join(format!(
            "{}.{}",
            self.sources.dsl_full_name,
            self.sources.hcl_extension()
        ));
        let json_file = json_variant(&hcl_file);

        let mut reads = VariableReads::new();
        for path in [hcl_file, json_file] {
            if path.exists() {
                reads.extend(read_var_file(&path)?);
            }
        }
        Ok(reads)
    }

    fn read_auto_var_files(&self) -> Result<VariableReads, Error> {
        let dir = self.sources.var_files_dir();
        let hcl_suffix = format!(".auto.{}", self.sources.hcl_extension());
        let json_suffix = format!("{hcl_suffix}.json");

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Default::default()),
            Err(error) => {
                return Err(Error::VarFileIo {
                    path: dir.to_path_buf(),
                    error,
                })
            }
        };

        let mut paths = vec![];
        for entry in entries {
            let entry = entry.map_err(|error| Error::VarFileIo {
                path: dir.to_path_buf(),
                error,
            })?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.ends_with(&hcl_suffix) || file_name.ends_with(&json_suffix) {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut reads = VariableReads::new();
        for path in paths {
            reads.extend(read_var_file(&path)?);
        }
        Ok(reads)
    }

    fn read_cli_assignments(&self) -> Result<VariableReads, Error> {
        let mut reads = VariableReads::new();
        for assignment in &self.sources.assignments {
            match assignment {
                CliAssignment::Variable { name, raw } => {
                    if !self.declared.contains(name) {
                        if self.sources.ignore_unknown_variables {
                            tracing::debug!(variable = %name, "ignoring unknown variable");
                            continue;
                        }
                        return Err(Error::UnknownVariable(name.clone()));
                    }
                    reads.insert(name.clone(), read_raw(name, raw));
                }
                CliAssignment::VarFile(path) => {
                    let path = if !path.exists() && !path.starts_with(&self.sources.basedir) {
                        self.sources.basedir.join(path)
                    } else {
                        path.clone()
                    };
                    reads.extend(read_var_file(&path)?);
                }
            }
        }
        Ok(reads)
    }
}

fn json_variant(path: &Path) -> PathBuf {
    let mut json = path.as_os_str().to_owned();
    json.push(".json");
    PathBuf::from(json)
}

/// Interpret a raw value (environment, `--var`, prompt)
///
/// The text is read as an expression, a bare word that would be a variable reference is taken as a
/// string.
pub fn parse_raw_value(raw: &str) -> Result<Value, String> {
    let expr: hcl_edit::expr::Expression = raw
        .parse()
        .map_err(|e: hcl_edit::parser::Error| e.to_string())?;
    let expr = expression_from_edit(expr);

    match EvalContext::default().evaluate(&expr) {
        Ok(value) => Ok(value),
        Err(errors)
            if errors
                .iter()
                .any(|e| matches!(e.kind(), ErrorKind::UndefinedVar(_))) =>
        {
            Ok(Value::String(raw.to_string()))
        }
        Err(errors) => Err(errors.to_string()),
    }
}

fn read_raw(name: &str, raw: &str) -> VariableRead {
    VariableRead {
        name: name.to_string(),
        value: parse_raw_value(raw),
    }
}

/// Read all assignments of one variable file, `.json` files are strict JSON objects
pub fn read_var_file(path: &Path) -> Result<VariableReads, Error> {
    tracing::info!(path = %path.display(), "reading variable file");
    let content = std::fs::read_to_string(path).map_err(|error| Error::VarFileIo {
        path: path.to_path_buf(),
        error,
    })?;

    let parse_error = |message: String| Error::VarFileParse {
        path: path.to_path_buf(),
        message,
    };

    let mut reads = VariableReads::new();

    if path.extension().is_some_and(|extension| extension == "json") {
        let object: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?;
        for (name, value) in object {
            reads.insert(
                name.clone(),
                VariableRead {
                    name,
                    value: Ok(crate::value::from_json(value)),
                },
            );
        }
        return Ok(reads);
    }

    let body = hcl_edit::parser::parse_body(&content).map_err(|e| parse_error(e.to_string()))?;
    if let Some(block) = body.blocks().next() {
        return Err(parse_error(format!(
            "blocks are not allowed in variable files, found `{}`",
            block.ident.value()
        )));
    }

    let ctx = EvalContext::default();
    for attribute in body.attributes() {
        let name = attribute.key.value().to_string();
        let expr = expression_from_edit(attribute.value.clone());
        reads.insert(
            name.clone(),
            VariableRead {
                name,
                value: ctx.evaluate(&expr).map_err(|e| e.to_string()),
            },
        );
    }
    Ok(reads)
}
