//! HTML report generation from the execution log.
//!
//! A report is a point-in-time snapshot: the log is read once, without
//! locking, so rows appended while a report renders may or may not appear.

use crate::model::{now_seconds, ExecutionRecord, TestStatus, DB_TIME_FORMAT, FILE_STAMP_FORMAT};
use crate::storage::{ExecutionLog, StoreError};
use askama::Template;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const REPORT_DIR: &str = "reports";
pub const REPORT_TITLE: &str = "Automation Test Report";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read execution log: {0}")]
    Store(#[from] StoreError),

    #[error("failed to render report: {0}")]
    Render(#[from] askama::Error),

    #[error("failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Aggregate view of the execution log. Derived on every generation.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub success_rate: f64,
    pub records: Vec<ExecutionRecord>,
}

impl ReportSummary {
    /// Tally statuses in a single pass over `records`, keeping their order.
    pub fn from_records(records: Vec<ExecutionRecord>) -> Self {
        let (mut passed, mut failed, mut skipped) = (0, 0, 0);
        for r in &records {
            match r.status {
                TestStatus::Pass => passed += 1,
                TestStatus::Fail => failed += 1,
                TestStatus::Skip => skipped += 1,
            }
        }
        let total = records.len();

        Self {
            total,
            passed,
            failed,
            skipped,
            success_rate: success_rate(passed, total),
            records,
        }
    }

    /// Success rate with two decimals and a percent sign, e.g. `"66.67%"`.
    pub fn success_rate_display(&self) -> String {
        format!("{:.2}%", self.success_rate)
    }
}

/// `passed / total * 100`, or `0.0` for an empty log.
pub fn success_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64 * 100.0
    }
}

struct ReportRow<'a> {
    id: i64,
    test_name: &'a str,
    status: &'static str,
    status_class: &'static str,
    test_type: &'static str,
    user_story_id: &'a str,
    test_case_id: &'a str,
    execution_time: String,
}

impl<'a> From<&'a ExecutionRecord> for ReportRow<'a> {
    fn from(r: &'a ExecutionRecord) -> Self {
        let status_class = match r.status {
            TestStatus::Pass => "status-pass",
            TestStatus::Fail => "status-fail",
            TestStatus::Skip => "status-skip",
        };
        Self {
            id: r.id,
            test_name: &r.test_name,
            status: r.status.as_str(),
            status_class,
            test_type: r.test_type.as_str(),
            user_story_id: &r.user_story_id,
            test_case_id: &r.test_case_id,
            execution_time: r.execution_time.format(DB_TIME_FORMAT).to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportPage<'a> {
    title: &'a str,
    generated_at: String,
    summary: &'a ReportSummary,
    rows: Vec<ReportRow<'a>>,
}

/// Render a summary into a self-contained HTML document.
pub fn render_html(summary: &ReportSummary, generated_at: NaiveDateTime) -> Result<String, ReportError> {
    let page = ReportPage {
        title: REPORT_TITLE,
        generated_at: generated_at.format(DB_TIME_FORMAT).to_string(),
        summary,
        rows: summary.records.iter().map(ReportRow::from).collect(),
    };
    Ok(page.render()?)
}

pub struct ReportGenerator {
    log: ExecutionLog,
    output_dir: PathBuf,
}

impl ReportGenerator {
    /// Reports are written to `{artifact_root}/reports/`.
    pub fn new(log: ExecutionLog, artifact_root: &Path) -> Self {
        Self {
            log,
            output_dir: artifact_root.join(REPORT_DIR),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Read the whole log and aggregate it.
    pub fn summarize(&self) -> Result<ReportSummary, ReportError> {
        let records = self.log.read_all()?;
        debug!(rows = records.len(), "execution log read for report");
        Ok(ReportSummary::from_records(records))
    }

    /// Generate a report stamped with the current time and return its path.
    pub fn generate(&self) -> Result<PathBuf, ReportError> {
        self.generate_with_summary().map(|(path, _)| path)
    }

    /// Like [`ReportGenerator::generate`], also handing back the summary the
    /// document was built from.
    pub fn generate_with_summary(&self) -> Result<(PathBuf, ReportSummary), ReportError> {
        let summary = self.summarize()?;
        let path = self.write(&summary, now_seconds())?;
        Ok((path, summary))
    }

    fn write(&self, summary: &ReportSummary, generated_at: NaiveDateTime) -> Result<PathBuf, ReportError> {
        let html = render_html(summary, generated_at)?;

        std::fs::create_dir_all(&self.output_dir).map_err(|source| ReportError::Io {
            path: self.output_dir.clone(),
            source,
        })?;
        let path = unique_report_path(&self.output_dir, generated_at);

        let io_err = |source| ReportError::Io {
            path: path.clone(),
            source,
        };
        let mut file = std::fs::File::create(&path).map_err(io_err)?;
        file.write_all(html.as_bytes()).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        info!(
            path = %path.display(),
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            success_rate = %summary.success_rate_display(),
            "HTML report generated"
        );
        Ok(path)
    }
}

/// `TestReport_{stamp}.html`, with a numeric suffix if a report from the
/// same second already exists.
fn unique_report_path(dir: &Path, generated_at: NaiveDateTime) -> PathBuf {
    let stamp = generated_at.format(FILE_STAMP_FORMAT).to_string();
    let mut path = dir.join(format!("TestReport_{}.html", stamp));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("TestReport_{}_{}.html", stamp, n));
        n += 1;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestType;
    use chrono::NaiveDate;

    fn rec(id: i64, name: &str, status: TestStatus) -> ExecutionRecord {
        let mut r = ExecutionRecord::new(
            name,
            status,
            TestType::Ui,
            Some("US-1"),
            None,
            "",
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(9, 30, 0).unwrap(),
        );
        r.id = id;
        r
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 2).unwrap().and_hms_opt(18, 0, 5).unwrap()
    }

    #[test]
    fn test_success_rate_zero_when_empty() {
        assert_eq!(success_rate(0, 0), 0.0);
        let s = ReportSummary::from_records(Vec::new());
        assert_eq!(s.total, 0);
        assert_eq!(s.success_rate_display(), "0.00%");
    }

    #[test]
    fn test_summary_counts_and_rate() {
        let s = ReportSummary::from_records(vec![
            rec(1, "a", TestStatus::Pass),
            rec(2, "b", TestStatus::Fail),
            rec(3, "c", TestStatus::Pass),
            rec(4, "d", TestStatus::Skip),
            rec(5, "e", TestStatus::Pass),
            rec(6, "f", TestStatus::Fail),
        ]);
        assert_eq!((s.total, s.passed, s.failed, s.skipped), (6, 3, 2, 1));
        assert!((s.success_rate - 50.0).abs() < 0.01);
        assert_eq!(s.success_rate_display(), "50.00%");

        let s = ReportSummary::from_records(vec![
            rec(1, "a", TestStatus::Pass),
            rec(2, "b", TestStatus::Pass),
            rec(3, "c", TestStatus::Fail),
        ]);
        assert_eq!(s.success_rate_display(), "66.67%");
    }

    #[test]
    fn test_render_empty_report() {
        let html = render_html(&ReportSummary::from_records(Vec::new()), stamp()).unwrap();
        assert!(html.contains(r#"<h2 id="total">0</h2>"#));
        assert!(html.contains(r#"<h2 id="passed">0</h2>"#));
        assert!(html.contains(r#"<h2 id="success-rate">0.00%</h2>"#));
        assert!(html.contains("data: [0, 0, 0]"));
        assert!(!html.contains("<td>"));
        assert!(html.contains("No test executions recorded."));
    }

    #[test]
    fn test_render_rows_and_escape_names() {
        let summary = ReportSummary::from_records(vec![
            rec(7, "<script>alert(1)</script>", TestStatus::Fail),
            rec(8, "checkout", TestStatus::Pass),
        ]);
        let html = render_html(&summary, stamp()).unwrap();

        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains(r#"<span class="status-fail">FAIL</span>"#));
        assert!(html.contains(r#"<span class="status-pass">PASS</span>"#));
        assert!(html.contains("<td>2024-06-01 09:30:00</td>"));
        assert!(html.contains("data: [1, 1, 0]"));
        assert!(html.find("<td>7</td>").unwrap() < html.find("<td>8</td>").unwrap());
    }

    #[test]
    fn test_unique_report_path_adds_suffix() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = unique_report_path(dir.path(), stamp());
        assert_eq!(first.file_name().unwrap(), "TestReport_20240602_180005.html");
        std::fs::write(&first, "x").unwrap();

        let second = unique_report_path(dir.path(), stamp());
        assert_eq!(second.file_name().unwrap(), "TestReport_20240602_180005_1.html");
    }

    #[test]
    fn test_generate_reports_write_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = ExecutionLog::open(&dir.path().join("ledger.db"), 5000).unwrap();
        let root = dir.path().join("artifacts");
        std::fs::create_dir_all(&root).unwrap();
        // A regular file where the reports directory should be.
        std::fs::write(root.join(REPORT_DIR), b"not a directory").unwrap();

        let generator = ReportGenerator::new(log, &root);
        assert!(matches!(generator.generate(), Err(ReportError::Io { .. })));
    }

    #[test]
    fn test_generate_fails_when_log_unreadable() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = ExecutionLog::open(&dir.path().join("ledger.db"), 5000).unwrap();
        log.pool().get().unwrap().execute_batch("DROP TABLE execution_log;").unwrap();

        let generator = ReportGenerator::new(log, &dir.path().join("artifacts"));
        assert!(matches!(generator.generate(), Err(ReportError::Store(_))));
        assert!(!generator.output_dir().exists());
    }
}
