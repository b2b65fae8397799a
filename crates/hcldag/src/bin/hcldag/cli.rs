//! hcldag cli interface

use clap::{ArgMatches, Parser, Subcommand, ValueEnum};
use hcldag::variables::CliAssignment;
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; hcldag ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve variables and locals and print the evaluation context
    ///
    /// Reads HCL from stdin unless any other source is provided (via -w, -f or -d)
    Plan(PlanCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct PlanCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub variables: VariableArgs,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Load files from work directory
    #[clap(short = 'w', long = "input-workdir")]
    pub workdir: bool,

    /// Load a file
    #[clap(short = 'f', long = "input-file")]
    pub files: Vec<PathBuf>,

    /// Load files from given directory
    #[clap(short = 'd', long = "input-dir")]
    pub directories: Vec<PathBuf>,

    /// Skip blocks of unknown types instead of failing
    #[clap(long = "ignore-unsupported-blocks")]
    pub ignore_unsupported_blocks: bool,
}

#[derive(Parser, Debug)]
pub struct VariableArgs {
    /// Set a variable, `name=value`
    #[arg(long = "var", value_parser = parse_variable)]
    pub vars: Vec<CliAssignment>,

    /// Load variable values from a file
    #[arg(long = "var-file")]
    pub var_files: Vec<PathBuf>,

    /// Do not fail on --var for undeclared variables
    #[arg(long = "ignore-unknown-variables")]
    pub ignore_unknown_variables: bool,

    /// Full name of the configuration language, names the default variable file
    /// `<name>.<abbreviation>vars`
    #[arg(long = "dsl-name", default_value = "hcldag")]
    pub dsl_full_name: String,

    /// Abbreviation used for `<ABBR>_VAR_<name>` environment variables and variable file extensions
    #[arg(long = "dsl-abbreviation", default_value = "hd")]
    pub dsl_abbreviation: String,
}

impl VariableArgs {
    /// --var and --var-file in the order they were given
    pub fn assignments(&self, matches: &ArgMatches) -> Vec<CliAssignment> {
        let indices = |id: &str| -> Vec<usize> {
            matches
                .indices_of(id)
                .map(|indices| indices.collect())
                .unwrap_or_default()
        };

        let mut indexed: Vec<(usize, CliAssignment)> = indices("vars")
            .into_iter()
            .zip(self.vars.iter().cloned())
            .chain(
                indices("var_files")
                    .into_iter()
                    .zip(self.var_files.iter().cloned().map(CliAssignment::VarFile)),
            )
            .collect();
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, assignment)| assignment).collect()
    }
}

fn parse_variable(value: &str) -> Result<CliAssignment, String> {
    CliAssignment::parse_variable(value)
        .ok_or_else(|| format!("expected `name=value`, got `{value}`"))
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Loaded documents of the work directory
    Documents,
    /// Graph vertices of the work directory and their ancestors
    Vertices,
}
