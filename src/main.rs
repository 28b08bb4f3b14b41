mod config;
mod error;
mod handlers;
mod loader;
mod models;
mod pipeline;
mod planner;
mod scraper;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::handlers::Handler;
use crate::pipeline::{LoadMode, Pipeline, RunStats};
use crate::utils::{RunTimer, fmt_count};

#[derive(Parser)]
#[command(name = "football-etl", about = "Football results and lineups ETL", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape every fbref season in the crawl window not yet ledgered
    Xg,

    /// Re-scrape each competition's current-season page
    Current,

    /// Scrape match reports and enqueue their lineups
    Lineups,

    /// Drain the lineup queue into per-match CSVs
    LoadLineups,

    /// Download football-data.co.uk files for the seasons in progress
    Update,

    /// Download every football-data.co.uk season file listed
    Backfill,

    /// Convert one results CSV to partitioned Parquet
    Standardise {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
    },

    /// Re-run `standardise` over the whole results bucket
    Restandardise,

    /// Clean one raw football-data.co.uk file
    CleanFootballData {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
    },

    /// Show how many links the ledger holds
    Ledger,

    /// Run a handler against a JSON event file and print its response
    Invoke {
        #[arg(value_enum)]
        handler: Handler,
        #[arg(short, long)]
        event: PathBuf,
    },
}

fn report(stats: &RunStats) {
    info!(
        "Done: {} planned, {} written, {} skipped, {} errors",
        stats.planned, stats.written, stats.skipped, stats.errors
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "football_etl=info,warn",
        1 => "football_etl=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let pipeline = Pipeline::connect(config).await?;

    match cli.command {
        Command::Xg => {
            let _t = RunTimer::start("xG results crawl");
            report(&pipeline.scrape_xg_result_seasons().await?);
        }

        Command::Current => {
            let _t = RunTimer::start("Current seasons");
            report(&pipeline.scrape_current_seasons().await?);
        }

        Command::Lineups => {
            let _t = RunTimer::start("Lineup scrape");
            report(&pipeline.scrape_team_lineups().await?);
        }

        Command::LoadLineups => {
            let _t = RunTimer::start("Lineup load");
            report(&pipeline.load_lineups().await?);
        }

        Command::Update => {
            let _t = RunTimer::start("football-data update");
            report(&pipeline.load_football_data(LoadMode::Update).await?);
        }

        Command::Backfill => {
            let _t = RunTimer::start("football-data backfill");
            report(&pipeline.load_football_data(LoadMode::Backfill).await?);
        }

        Command::Standardise { bucket, key } => {
            let out = pipeline.standardise_xg_results(&bucket, &key).await?;
            println!("{}", out);
        }

        Command::Restandardise => {
            let _t = RunTimer::start("Restandardise");
            report(&pipeline.restandardise_all().await?);
        }

        Command::CleanFootballData { bucket, key } => {
            let rows = pipeline.clean_football_data(&bucket, &key).await?;
            println!("{} rows", fmt_count(rows));
        }

        Command::Ledger => {
            let n = pipeline.ledger_size().await?;
            println!("Ledger holds {} links", fmt_count(n));
        }

        Command::Invoke { handler, event } => {
            let raw = std::fs::read_to_string(&event)
                .with_context(|| format!("Cannot read event file {:?}", event))?;
            let event: serde_json::Value =
                serde_json::from_str(&raw).with_context(|| format!("{:?} is not JSON", event))?;
            let response = handlers::invoke(&pipeline, handler, event).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
