//! Batch synchronization into the operator database.
//!
//! Each sync step works item by item and never stops on one item's failure:
//! failures are logged and counted in the returned [`SyncReport`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use prts_core::{AppConfig, DetailRecord, Error, OperatorDb};
use scraper::Html;
use serde::Serialize;

use crate::detail::DetailPipeline;
use crate::extract::{parse_glossary, parse_roster};
use crate::fetch::FetchClient;
use crate::render::Launcher;

/// Outcome counts of one sync step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl SyncReport {
    fn all(total: usize) -> Self {
        Self { total, succeeded: total, failed: 0 }
    }
}

/// Shared flag checked at the top of every batch iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Batch settings for detail syncs.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub item_delay: Duration,
    pub cancel: CancelFlag,
    /// Also write every assembled record as pretty JSON into this directory.
    pub dump_dir: Option<PathBuf>,
}

impl BatchOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self { item_delay: config.item_delay(), ..Self::default() }
    }
}

/// Fetch the static glossary and store it.
///
/// Skipped when the database already holds at least as many terms as the
/// page lists.
pub async fn sync_terms(db: &OperatorDb, client: &FetchClient, config: &AppConfig) -> Result<SyncReport, Error> {
    let markup = client.fetch_article(&config.glossary_path).await?;
    let terms = parse_glossary(&Html::parse_document(&markup));

    let stored = db.count_global_terms().await?;
    if stored >= terms.len() {
        tracing::info!(stored, listed = terms.len(), "glossary already up to date, skipping");
        return Ok(SyncReport { total: terms.len(), ..Default::default() });
    }

    let written = db.upsert_static_terms(&terms).await?;
    let report = SyncReport::all(written);
    tracing::info!(total = report.total, "static glossary stored");
    Ok(report)
}

/// Fetch the roster listing and store it.
pub async fn sync_roster(db: &OperatorDb, client: &FetchClient, config: &AppConfig) -> Result<SyncReport, Error> {
    let markup = client.fetch_article(&config.roster_path).await?;
    let entries = parse_roster(&Html::parse_document(&markup))?;

    let written = db.upsert_roster(&entries).await?;
    let report = SyncReport::all(written);
    tracing::info!(total = report.total, "roster stored");
    Ok(report)
}

/// Persist one detail record. Every write is attempted and logged; the first
/// failure is returned.
///
/// Child rows reference the base row, so nothing else is written when the
/// base write fails.
pub async fn store_detail(db: &OperatorDb, record: &DetailRecord) -> Result<(), Error> {
    let name = record.subject_name.as_str();
    db.upsert_detail_base(record).await.inspect_err(|e| {
        tracing::error!(subject = name, write = "base", "write failed: {e}");
    })?;

    let mut first_error = None;
    let mut log = |write: &'static str, result: Result<usize, Error>| match result {
        Ok(rows) => tracing::debug!(subject = name, write, rows, "write ok"),
        Err(e) => {
            tracing::error!(subject = name, write, "write failed: {e}");
            first_error.get_or_insert(e);
        }
    };

    log("attributes", db.replace_attributes(name, &record.base_attributes).await);
    log("talents", db.replace_talents(name, &record.talents).await);
    log("skills", db.replace_skills(name, &record.skills).await);
    log("glossary", db.record_detail_terms(&record.terms).await);
    log("term relations", db.replace_term_relations(name, &record.terms).await);

    first_error.map_or(Ok(()), Err)
}

/// Characters that cannot appear in a file name on common platforms.
const RESERVED_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// File name for a subject's dump: separators, reserved and control
/// characters become `_`, so the result never leaves the dump directory.
fn dump_file_name(subject_name: &str) -> String {
    let stem: String = subject_name
        .trim()
        .chars()
        .map(|c| if c.is_control() || RESERVED_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let stem = stem.trim_start_matches('.');
    if stem.is_empty() { "_.json".to_string() } else { format!("{stem}.json") }
}

async fn dump_record(dir: &Path, record: &DetailRecord) -> Result<PathBuf, Error> {
    let json = serde_json::to_string_pretty(record).map_err(std::io::Error::from)?;
    let path = dir.join(dump_file_name(&record.subject_name));
    tokio::fs::write(&path, json).await?;
    Ok(path)
}

/// Run the detail pipeline over `names`, one at a time, and store each
/// record.
///
/// After every item except the last the batch pauses for `item_delay`.
/// Cancellation is checked before each item and before each pause; an item
/// already in flight finishes. The render pool is released when the batch
/// ends, cancelled or not.
pub async fn sync_details<L: Launcher>(
    db: &OperatorDb, pipeline: &DetailPipeline<'_, L>, names: &[String], options: &BatchOptions,
) -> SyncReport {
    let mut report = SyncReport { total: names.len(), ..Default::default() };

    for (idx, name) in names.iter().enumerate() {
        if options.cancel.is_cancelled() {
            tracing::warn!(done = idx, total = names.len(), "batch cancelled");
            break;
        }
        tracing::info!(n = idx + 1, total = names.len(), subject = %name, "syncing subject");

        if sync_one(db, pipeline, name, options).await {
            report.succeeded += 1;
        } else {
            report.failed += 1;
        }

        let is_last = idx + 1 == names.len();
        if !is_last && !options.cancel.is_cancelled() && !options.item_delay.is_zero() {
            tracing::debug!(ms = options.item_delay.as_millis() as u64, "pausing before next subject");
            tokio::time::sleep(options.item_delay).await;
        }
    }
    pipeline.pool().release_all().await;

    tracing::info!(
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failed,
        "detail sync finished"
    );
    report
}

/// Fetch, optionally dump, and store one subject. `true` when stored.
async fn sync_one<L: Launcher>(
    db: &OperatorDb, pipeline: &DetailPipeline<'_, L>, name: &str, options: &BatchOptions,
) -> bool {
    let record = match pipeline.fetch(name).await {
        Ok(record) => record,
        Err(e) => {
            tracing::error!(subject = %name, "detail fetch failed: {e}");
            return false;
        }
    };

    if let Some(dir) = &options.dump_dir {
        match dump_record(dir, &record).await {
            Ok(path) => tracing::debug!(path = %path.display(), "record dumped"),
            Err(e) => tracing::warn!(subject = %name, "dump failed: {e}"),
        }
    }

    store_detail(db, &record).await.is_ok()
}
