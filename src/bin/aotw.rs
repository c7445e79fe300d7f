//! CLI binary for the Album of the Week scheduler.
//!
//! Meant to be run from cron: `aotw daily` every day, `aotw resolve` at
//! least once per period (re-running is safe).

use aotw::{AotwConfig, AotwManager, Collaborators, Environment};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Album of the Week: rotation, reminders and playlist sync.
#[derive(Parser)]
#[command(name = "aotw", version, about)]
struct Cli {
    /// Runtime environment. `test` prints mail instead of sending it.
    #[arg(short, long, default_value = "test")]
    env: Environment,

    /// Pretend today is this date (YYYY-MM-DD). Test environment only.
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Path to TOML configuration file. Environment variables are used otherwise.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Announce a new period or send a listening reminder, as scheduled.
    Daily,

    /// Capture, store, sync and announce this period's album.
    Resolve,

    /// Show the current period, chooser and stored album.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aotw=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let today = resolve_today(&config, cli.date)?;
    let collaborators = Collaborators::for_config(&config)?;
    let manager = AotwManager::new(&config, today, collaborators)?;

    match cli.command {
        Command::Daily => {
            let action = manager.run_daily().await?;
            println!("{today}: {action}");
        }
        Command::Resolve => {
            let report = manager.resolve().await?;
            print!("{report}");
            if let Some(stage) = report.failed_stage() {
                error!("resolution of {} stopped at {stage}", report.period);
                anyhow::bail!("{stage} stage failed; re-run `aotw resolve` to retry");
            }
            if !report.is_complete() {
                info!("resolution incomplete; it will resume on the next run");
            }
        }
        Command::Status => {
            let status = manager.status().await?;
            println!("{status}");
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<AotwConfig> {
    let Some(path) = &cli.config else {
        return Ok(AotwConfig::from_env(cli.env)?);
    };

    let mut config = AotwConfig::from_file(path)?;
    config.environment = cli.env;
    // The token is never stored in the file.
    if config.spotify_access_token.is_none() {
        config.spotify_access_token = std::env::var("SPOTIFY_ACCESS_TOKEN").ok();
    }
    Ok(config)
}

fn resolve_today(config: &AotwConfig, date: Option<NaiveDate>) -> anyhow::Result<NaiveDate> {
    let today = config.run_date(chrono::Utc::now())?;
    Ok(match (config.environment, date) {
        (Environment::Test, Some(date)) => {
            info!("using {date} as today");
            date
        }
        (Environment::Prod, Some(date)) => {
            warn!("--date {date} ignored in prod; using {today} ({})", config.timezone);
            today
        }
        (_, None) => today,
    })
}
