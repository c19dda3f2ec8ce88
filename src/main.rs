use anyhow::{Context, Result};
use chrono::Local;
use clap::builder::PossibleValuesParser;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use paperpolish::agent::AiderAgent;
use paperpolish::latex::{insert_references, LatexCompiler, MissingInsertionPoint, ProjectLayout};
use paperpolish::model::{select_model, AVAILABLE_MODELS, DEFAULT_MODEL};
use paperpolish::polish::{PolishConfig, Polisher, WriteupFormat};
use paperpolish::review::CommandReviewer;

/// CLI app for polishing a LaTeX paper with an AI coding assistant and LLM review
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Insert a bibliography into a LaTeX template
    Merge {
        /// LaTeX template with `REFERENCES HERE` or a references.bib filecontents block
        template: PathBuf,
        /// Bibliography file
        references: PathBuf,
        /// Output file (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pass the template through unchanged when it has no insertion point
        #[arg(long)]
        keep_unmatched: bool,
    },
    /// Rewrite, review and improve a project's paper
    Polish(PolishArgs),
}

#[derive(Args)]
struct PolishArgs {
    /// Model to use for writing and reviewing
    #[arg(long, default_value = DEFAULT_MODEL, value_parser = PossibleValuesParser::new(AVAILABLE_MODELS))]
    model: String,
    /// What format to use for writeup
    #[arg(long, default_value = "latex")]
    writeup: WriteupFormat,
    /// The project name for polish
    #[arg(long, default_value = "PGG-VE-Chaos")]
    project_name: String,
    /// Improve based on reviews
    #[arg(long)]
    improvement: bool,
    /// Write the run log to log.txt inside the results folder
    #[arg(long)]
    log_file: bool,
    /// Directory holding one template folder per project
    #[arg(long, default_value = "templates")]
    templates_dir: PathBuf,
    /// Directory receiving one results folder per project
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,
    /// Coding assistant executable (defaults to $PAPERPOLISH_AIDER_BIN or `aider`)
    #[arg(long)]
    aider_bin: Option<String>,
    /// Review executable (defaults to $PAPERPOLISH_REVIEWER_BIN or `ai-scientist-review`)
    #[arg(long)]
    reviewer_bin: Option<String>,
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {:?}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn env_or(arg: Option<String>, var: &str, default: &str) -> String {
    arg.or_else(|| std::env::var(var).ok())
        .unwrap_or_else(|| default.to_string())
}

fn merge(template: &Path, references: &Path, output: Option<&Path>, keep_unmatched: bool) -> Result<()> {
    let on_missing = if keep_unmatched {
        MissingInsertionPoint::Keep
    } else {
        MissingInsertionPoint::Error
    };
    let merged = insert_references(template, references, output, on_missing)
        .with_context(|| format!("Failed to insert {:?} into {:?}", references, template))?;

    if let Some(content) = merged {
        print!("{}", content);
    }
    Ok(())
}

async fn polish(args: PolishArgs, verbose: bool) -> Result<()> {
    let model = select_model(&args.model)?;
    model.check_credentials()?;

    let layout = ProjectLayout::with_roots(&args.project_name, &args.templates_dir, &args.results_dir);
    let run = layout
        .create_run_folder(Local::now().naive_local())
        .with_context(|| format!("Failed to prepare a run of project {}", args.project_name))?;

    let log_path = run.log_file();
    init_logging(verbose, args.log_file.then_some(log_path.as_path()))?;
    info!("folder_name: {:?}", run.root);
    info!(
        "Using {} with model {} (selected as {}).",
        model.provider, model.client_model, model.name
    );
    for var in model.unset_optional_env_vars() {
        warn!("{} is not set; {} falls back to the provider's default credentials", var, model.name);
    }
    info!("base_dir: {:?}", layout.base_dir);
    info!("results_dir: {:?}", layout.results_dir);
    info!("Processing project: {}", args.project_name);

    let agent = AiderAgent::new(env_or(args.aider_bin, "PAPERPOLISH_AIDER_BIN", "aider"));
    let reviewer = CommandReviewer::new(env_or(
        args.reviewer_bin,
        "PAPERPOLISH_REVIEWER_BIN",
        "ai-scientist-review",
    ));
    let polisher = Polisher::new(agent, reviewer, LatexCompiler::new());

    let mut config = PolishConfig::new(layout, model);
    config.writeup = args.writeup;
    config.improvement = args.improvement;

    let report = polisher.run(&config, run).await;
    for outcome in &report.outcomes {
        info!("{}: {}", outcome.step, outcome.message);
    }
    println!(
        "Completed project: {}, Success: {}",
        args.project_name, report.success
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Merge {
            template,
            references,
            output,
            keep_unmatched,
        } => {
            init_logging(cli.verbose, None)?;
            merge(&template, &references, output.as_deref(), keep_unmatched)
        }
        Command::Polish(args) => polish(args, cli.verbose).await,
    }
}
