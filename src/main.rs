use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod aggregate;
mod config;
mod dispatch;
mod error;
mod integrations;
mod journal;
mod lock;
mod models;
mod storage;
mod sync;

use crate::config::{Config, config_path};
use crate::error::SyncError;
use crate::integrations::asana::AsanaClient;
use crate::integrations::harvest::HarvestClient;
use crate::journal::RunJournal;
use crate::lock::{LOCK_FILE, RunLock};
use crate::models::DateWindow;
use crate::storage::{JsonSnapshotStore, SnapshotStore};
use crate::sync::SyncOrchestrator;

#[derive(Parser, Debug)]
#[command(
    name = "hoursync",
    version,
    about = "Roll Harvest hours up into an Asana custom field",
    after_help = "Each `run` performs one phase: a fetch that stages changed totals, \
                  or a dispatch that applies them. Schedule it at least twice per cycle."
)]
struct Cli {
    /// Config file (defaults to $HOURSYNC_CONFIG or the platform config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one sync phase (the default).
    Run(RunArgs),
    /// Show the stored snapshot state without contacting either service.
    Status,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// First day of the fetch window (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day of the fetch window (YYYY-MM-DD), defaults to today.
    #[arg(long)]
    to: Option<NaiveDate>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let path = cli.config.unwrap_or_else(config_path);
    let config = Config::load(&path)?;

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => run(&config, &args),
        Command::Status => status(&config),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HOURSYNC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "hoursync=debug,info"
        } else {
            "hoursync=info,warn"
        })
    });

    let format = env::var("HOURSYNC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(config: &Config, args: &RunArgs) -> anyhow::Result<()> {
    config.validate()?;
    let window = resolve_window(args, config.harvest.lookback_days, Local::now().date_naive())?;

    let state_dir = &config.data.state_dir;
    let lock = RunLock::acquire(&state_dir.join(LOCK_FILE), config.lock.timeout())
        .map_err(SyncError::from)?;
    tracing::debug!(lock = %lock.path().display(), "holding run lock");

    let timeout = config.http.timeout();
    let harvest = HarvestClient::new(&config.harvest, timeout)?;
    let asana = AsanaClient::new(&config.asana, timeout)?;
    let store = JsonSnapshotStore::in_dir(state_dir);
    let journal = RunJournal::new(&config.data.log_dir);

    let outcome = SyncOrchestrator::new(&harvest, &asana, &store, &journal, &config.asana.field_name)
        .run(window)
        .context("sync run failed")?;

    drop(lock);
    tracing::info!(phase = outcome.phase().as_str(), "run complete");
    println!("hoursync: {}", outcome.summary());
    Ok(())
}

fn status(config: &Config) -> anyhow::Result<()> {
    let store = JsonSnapshotStore::in_dir(&config.data.state_dir);
    let snapshot = store
        .load()
        .with_context(|| format!("reading {}", store.path().display()))?;

    println!("snapshot:  {}", store.path().display());
    println!("next phase: {}", snapshot.phase().as_str());
    println!("tracked tasks: {}", snapshot.all_hours.len());
    println!("staged updates: {}", snapshot.staged_count());
    if let Some(staged_at) = snapshot.pending_diff.as_ref().and_then(|d| d.staged_at) {
        println!("last staged: {}", staged_at.to_rfc3339());
    }
    if let Some(last) = &snapshot.last_dispatch {
        let at = last
            .attempted_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "last dispatch: {at} applied {} | no field {} | lookup failed {} | write failed {}",
            last.applied,
            last.skipped,
            last.lookup_failed,
            last.failed.len()
        );
        if !last.failed.is_empty() {
            println!("  failed: {}", last.failed.join(", "));
        }
    }
    Ok(())
}

fn resolve_window(
    args: &RunArgs,
    lookback_days: u32,
    today: NaiveDate,
) -> Result<DateWindow, SyncError> {
    let to = args.to.unwrap_or(today);
    let from = match args.from {
        Some(from) => from,
        None => {
            DateWindow::trailing(to, lookback_days)
                .ok_or_else(|| {
                    SyncError::Config(format!("lookback of {lookback_days} days from {to} is out of range"))
                })?
                .from
        }
    };
    if from > to {
        return Err(SyncError::Config(format!(
            "--from {from} is after --to {to}"
        )));
    }
    Ok(DateWindow { from, to })
}
