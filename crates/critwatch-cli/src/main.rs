mod cmd;
mod output;

use clap::Parser;
use cmd::run::RunStatus;
use critwatch_core::run::RunOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "critwatch",
    about = "Escalate critical alert bugs that have no card on the ops board",
    version
)]
struct Cli {
    /// Configuration files; each one is processed as an independent run
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long, short = 'j')]
    json: bool,

    /// Fetch and reconcile, but send no email and create no card
    #[arg(long)]
    dry_run: bool,

    /// Append health-dashboard links to matching card descriptions
    #[arg(long)]
    enrich_health_links: bool,

    /// Validate the configuration files and exit
    #[arg(long, conflicts_with_all = ["dry_run", "enrich_health_links"])]
    check: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let opts = RunOptions {
        dry_run: cli.dry_run,
        enrich_health_links: cli.enrich_health_links,
    };

    let mut exit_code = 0;
    for file in &cli.files {
        let result = if cli.check {
            cmd::check::run(file, cli.json).map(|()| RunStatus::Clean)
        } else {
            cmd::run::run(file, &opts, cli.json)
        };
        match result {
            Ok(RunStatus::Clean) => {}
            Ok(RunStatus::Partial) => {
                if exit_code == 0 {
                    exit_code = 2;
                }
            }
            Err(e) => {
                // Print the full error chain (anyhow's alternate Display)
                eprintln!("error: {}: {e:#}", file.display());
                exit_code = 1;
            }
        }
    }

    std::process::exit(exit_code);
}
