//! testledger -- test execution ledger.
//!
//! Captures the outcome of UI and API test runs together with a diagnostic
//! artifact (screenshot or request/response capture), appends them to a
//! SQLite execution log, and renders the log as an HTML report.

pub mod artifacts;
pub mod capture;
pub mod config;
pub mod model;
pub mod report;
pub mod storage;

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::artifacts::ArtifactStore;
use crate::capture::ResultCapture;
use crate::config::LedgerConfig;
use crate::report::{ReportGenerator, ReportSummary};
use crate::storage::{ExecutionLog, StoreError};

/// Open the execution log named by `config`.
pub fn open_log(config: &LedgerConfig) -> Result<ExecutionLog, StoreError> {
    ExecutionLog::open(&config.storage.db_path, config.storage.busy_timeout_ms)
}

/// Build the capture pipeline a test-framework integration hands outcomes to.
pub fn open_capture(config: &LedgerConfig) -> Result<ResultCapture, StoreError> {
    let log = open_log(config)?;
    Ok(ResultCapture::new(log, ArtifactStore::new(&config.artifacts.root)))
}

/// Generate one report from the current log contents.
///
/// SQLite and file I/O are blocking, so the work runs on the blocking pool.
pub async fn generate_report(config: &LedgerConfig) -> Result<(PathBuf, ReportSummary)> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        tracing::info!(db_path = %config.storage.db_path.display(), "Generating report");
        let log = open_log(&config).context("failed to open execution log")?;
        let generator = ReportGenerator::new(log, &config.artifacts.root);
        let out = generator
            .generate_with_summary()
            .context("report generation failed")?;
        Ok::<_, anyhow::Error>(out)
    })
    .await
    .context("report task panicked")?
}
