use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use cpws_pipeline::config::PipelineConfig;
use cpws_pipeline::generator::GeneratorParams;
use cpws_pipeline::{dashboard, features, generator, recap, rollup};

#[derive(Parser)]
#[command(name = "cpws-pipeline")]
#[command(about = "Simulated beverage-distributor sales pipeline")]
struct Args {
    /// Optional JSON config file; defaults to the built-in fixture universe
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate synthetic daily records and update the history table
    Generate {
        /// Number of days to generate (backwards from today)
        #[arg(long, default_value_t = 1)]
        days: usize,

        /// Optional start date (YYYY-MM-DD); generation goes forward from it
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Overwrite existing daily files and replace those days in history
        #[arg(long)]
        force: bool,

        /// RNG seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Derive row-level features and build the rollup tables
    Process,

    /// Build the weekly recap page for the most recent week
    Recap,

    /// Build the static dashboard page
    Dashboard,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    match args.command {
        Command::Generate {
            days,
            start,
            force,
            seed,
        } => {
            let params = GeneratorParams {
                days,
                start,
                force,
                seed,
            };
            let report = generator::run(&cfg, &params)?;
            info!(
                generated = report.generated.len(),
                skipped = report.skipped.len(),
                history_rows = report.history_rows,
                "generation complete"
            );
        }
        Command::Process => {
            let enriched = features::run(&cfg)?;
            rollup::write_all(&cfg, &enriched)?;
            info!(rows = enriched.height(), "processing complete");
        }
        Command::Recap => {
            let path = recap::run(&cfg)?;
            info!(path = %path.display(), "recap complete");
        }
        Command::Dashboard => {
            let path = dashboard::run(&cfg)?;
            info!(path = %path.display(), "dashboard complete");
        }
    }

    Ok(())
}
