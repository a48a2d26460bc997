mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "autofix",
    about = "Run a project's scripts, ask a repair oracle to fix the failing ones, repeat",
    version,
    propagate_version = true
)]
struct Cli {
    /// Directory holding autofix.yaml, results and backups
    /// (default: nearest ancestor with autofix.yaml, else cwd)
    #[arg(long, global = true, env = "AUTOFIX_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every script of a project once and save the results
    Exec {
        /// Project directory to sweep
        #[arg(short = 'p', long = "project-path")]
        project_path: PathBuf,
    },

    /// Repair the failing scripts listed in a results record
    Fix {
        /// Path to a summary_*.json record
        record: PathBuf,
    },

    /// Sweep and repair until every script passes or the budget runs out
    Run {
        /// Project directory
        project: PathBuf,

        /// Override max_iterations from autofix.yaml
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Run each sweep and repair pass as a separate autofix process
        #[arg(long)]
        isolated: bool,
    },

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Config { .. } => tracing::Level::WARN,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let workspace = root::resolve_workspace(cli.workspace.as_deref());

    let result = match cli.command {
        Commands::Exec { project_path } => cmd::exec::run(&workspace, &project_path, cli.json),
        Commands::Fix { record } => cmd::fix::run(&workspace, &record, cli.json),
        Commands::Run {
            project,
            max_iterations,
            isolated,
        } => cmd::run::run(&workspace, &project, max_iterations, isolated, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&workspace, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
