//! harbor-modifier CLI
//!
//! Entry point for the `harbor-modifier` command-line tool.

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use harbor_modifier::config::StepOverrides;
use harbor_modifier::{
    ChartTool, ConfigOverrides, EffectiveConfig, HelmCli, Pipeline, PipelineError, RunSummary,
    StepStatus,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "harbor-modifier")]
#[command(about = "Pull the Harbor Helm chart and apply file-based modifications")]
#[command(disable_version_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Harbor chart version (default: 1.18.0)
    #[arg(long, global = true)]
    version: Option<String>,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Project directory holding the chart and modifications (default: cwd)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Config file (default: <project-dir>/harbor-modifier.toml if present)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Keep the bundled harbor-db instead of relizapostgresql
    #[arg(long, global = true)]
    no_database_substitution: bool,

    /// Skip template overlays
    #[arg(long, global = true)]
    no_overlays: bool,

    /// Run `helm lint` after the dependency build
    #[arg(long, global = true)]
    lint: bool,

    /// Write a JSON run summary to this path
    #[arg(long, global = true)]
    summary: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Fetch, patch and validate the chart (default)
    Run,

    /// Patch an already fetched chart without calling helm
    Patch,

    /// Show which steps are already applied, without changing anything
    Status,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("fatal: {:#}", err);
        let code = err
            .downcast_ref::<PipelineError>()
            .map(PipelineError::exit_code)
            .unwrap_or(1);
        process::exit(code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => env::current_dir().context("failed to get working directory")?,
    };

    let overrides = ConfigOverrides {
        version: cli.version.clone(),
        steps: StepOverrides {
            database_substitution: cli.no_database_substitution.then_some(false),
            overlays: cli.no_overlays.then_some(false),
        },
        lint: cli.lint.then_some(true),
    };
    let config = EffectiveConfig::build(&project_dir, cli.config.as_deref(), &overrides)
        .map_err(PipelineError::from)?;
    for source in &config.sources {
        if let Some(path) = &source.path {
            info!("Using config {}", path.display());
        }
    }

    let tool = HelmCli::new(config.config.helm.clone());
    let pipeline = Pipeline::new(config, tool);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            print_banner(&pipeline);
            let summary = pipeline.run()?;
            finish(&pipeline, &summary, cli.summary.as_deref())
        }
        Commands::Patch => {
            print_banner(&pipeline);
            let summary = pipeline.run_patch_only()?;
            finish(&pipeline, &summary, cli.summary.as_deref())
        }
        Commands::Status => {
            print_status(&pipeline.status()?);
            Ok(())
        }
    }
}

fn print_banner<T: ChartTool>(pipeline: &Pipeline<T>) {
    let config = pipeline.config();
    println!("===================================");
    println!("Harbor Chart Automation");
    println!("===================================");
    println!("Version: {}", config.config.version);
    println!("Project: {}", config.project_dir.display());
    println!();
}

fn finish<T: ChartTool>(
    pipeline: &Pipeline<T>,
    summary: &RunSummary,
    summary_path: Option<&Path>,
) -> anyhow::Result<()> {
    if let Some(path) = summary_path {
        summary
            .write_to_file(path)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        info!("Summary written to {}", path.display());
    }

    let chart_dir = pipeline.config().chart_dir();
    println!();
    println!("{}", summary);
    println!();
    println!("All modifications applied successfully!");
    println!();
    println!("Modified chart location: {}", chart_dir.display());
    println!();
    println!("Next steps:");
    println!("  1. Review the modified chart");
    println!("  2. Update values as needed");
    println!(
        "  3. Install: helm install harbor {} -n harbor --create-namespace",
        chart_dir.display()
    );
    Ok(())
}

fn print_status(statuses: &[StepStatus]) {
    let width = statuses.iter().map(|s| s.step.len()).max().unwrap_or(0);
    for status in statuses {
        let state = if status.applied { "applied" } else { "pending" };
        println!(
            "[{:<7}] {:<width$}  {}",
            state,
            status.step,
            status.detection,
            width = width
        );
    }
}
