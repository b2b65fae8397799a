mod cli;

use hcldag::config::{ConfigOptions, Configuration};
use hcldag::hcl_documents::HclDocuments;
use hcldag::registry::BlockRegistry;
use hcldag::variables::StdinPrompter;
use std::io::IsTerminal;
use std::sync::Arc;

fn main() {
    use clap::{CommandFactory, FromArgMatches};
    let matches = cli::Cli::command().get_matches();
    let cli = match cli::Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("HCLDAG_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Plan(plan_cli) => {
            let plan_matches = matches.subcommand_matches("plan").unwrap_or(&matches);
            plan(plan_cli, plan_matches)
        }
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn plan(cli: cli::PlanCommand, matches: &clap::ArgMatches) -> anyhow::Result<()> {
    let documents = load(&cli.input)?;

    let mut options = ConfigOptions::new(
        std::env::current_dir()?,
        cli.variables.dsl_full_name.clone(),
        cli.variables.dsl_abbreviation.clone(),
    )
    .with_assignments(cli.variables.assignments(matches))
    .ignore_unknown_variables(cli.variables.ignore_unknown_variables)
    .ignore_unsupported_blocks(cli.input.ignore_unsupported_blocks);

    if std::io::stdin().is_terminal() {
        options = options.with_prompter(Arc::new(StdinPrompter));
    }

    let registry = Arc::new(BlockRegistry::with_common_kinds());
    let mut config = Configuration::load(registry, &documents, options)?;
    config.run_plan()?;

    output(&cli.output, &config.evaluation_value())?;
    Ok(())
}

fn load(input: &cli::InputArgs) -> anyhow::Result<HclDocuments> {
    let mut documents = HclDocuments::default();

    if !input.workdir && input.files.is_empty() && input.directories.is_empty() {
        let stdin = std::io::read_to_string(std::io::stdin())?;
        documents.insert(stdin, None)?;
        return Ok(documents);
    }

    if input.workdir {
        documents.load_directory(&std::env::current_dir()?)?;
    }

    for file_path in &input.files {
        documents.load_file(file_path)?;
    }

    for dir_path in &input.directories {
        documents.load_directory(dir_path)?;
    }

    anyhow::ensure!(documents.source_count() > 0, "No files loaded");

    Ok(documents)
}

fn output(output: &cli::OutputArgs, value: &hcl::Value) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}

/// developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    let mut documents = HclDocuments::default();
    documents.load_directory(&std::env::current_dir()?)?;

    match cli.command {
        Documents => println!("{documents:#?}"),
        Vertices => {
            let options = ConfigOptions::new(std::env::current_dir()?, "hcldag".into(), "hd".into())
                .ignore_unsupported_blocks(true);
            let registry = Arc::new(BlockRegistry::with_common_kinds());
            let mut config = Configuration::load(registry, &documents, options)?;
            // the graph is still worth printing when variables can not be resolved
            if let Err(errors) = config.run_pre_plan() {
                tracing::warn!(%errors, "pre-plan failed");
            }

            for (address, _) in config.vertices() {
                let parents = config.ancestors(address)?;
                let parents: Vec<_> = parents.iter().map(String::as_str).collect();
                println!("{address} <- [{}]", parents.join(", "));
            }
        }
    }

    Ok(())
}
