//! prts-sync entry point.
//!
//! Scrapes the PRTS wiki into the local SQLite database. Logs go to stderr;
//! the per-step summaries are printed to stdout as JSON.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prts_client::render::{ChromeLauncher, RenderPool};
use prts_client::sync::{BatchOptions, CancelFlag, SyncReport, sync_details, sync_roster, sync_terms};
use prts_client::{DetailPipeline, FetchClient, FetchConfig};
use prts_core::{AppConfig, OperatorDb};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "prts-sync", version, about = "Sync PRTS wiki operator data into SQLite")]
struct Cli {
    /// Database path; overrides `db_path` from the configuration.
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Also write every detail record as pretty JSON into this directory.
    #[arg(long, global = true, value_name = "DIR")]
    dump: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Store the static glossary.
    Terms,
    /// Store the roster listing.
    Roster,
    /// Scrape and store the detail pages of the named subjects.
    Detail {
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,
    },
    /// Glossary, roster, then the detail page of every stored subject.
    All,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Cancel the batch on the first Ctrl-C. The subject in flight finishes.
fn install_cancel_handler() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current subject");
            flag.cancel();
        }
    });
    cancel
}

async fn run_details(
    db: &OperatorDb, config: &AppConfig, names: &[String], options: &BatchOptions,
) -> SyncReport {
    let pool = RenderPool::new(ChromeLauncher::new(config.browser.clone()));
    let pipeline = DetailPipeline::new(&pool, config);
    sync_details(db, &pipeline, names, options).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let mut config = AppConfig::load().context("loading configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    if let Some(dir) = &cli.dump {
        std::fs::create_dir_all(dir).with_context(|| format!("creating dump directory {}", dir.display()))?;
    }

    tracing::info!(db = %config.db_path.display(), "starting prts-sync");
    let db = OperatorDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let client = FetchClient::new(FetchConfig::from_app(&config))?;

    let options = BatchOptions {
        cancel: install_cancel_handler(),
        dump_dir: cli.dump,
        ..BatchOptions::from_config(&config)
    };

    let mut summary = BTreeMap::new();
    match cli.command {
        Commands::Terms => {
            summary.insert("terms", sync_terms(&db, &client, &config).await?);
        }
        Commands::Roster => {
            summary.insert("roster", sync_roster(&db, &client, &config).await?);
        }
        Commands::Detail { names } => {
            summary.insert("detail", run_details(&db, &config, &names, &options).await);
        }
        Commands::All => {
            summary.insert("terms", sync_terms(&db, &client, &config).await?);
            summary.insert("roster", sync_roster(&db, &client, &config).await?);
            let names = db.list_operator_names().await?;
            summary.insert("detail", run_details(&db, &config, &names, &options).await);
        }
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
