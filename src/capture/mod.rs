//! Result capture -- turns one finished test into an artifact, an execution
//! row, and a detail row.
//!
//! Nothing here reports failure to the caller. A telemetry problem must never
//! change a test's verdict, so every error is logged and the pipeline moves
//! on to the next independent step.

use crate::artifacts::ArtifactStore;
use crate::model::{now_seconds, DetailRecord, ExecutionRecord, TestStatus, TestType, EMPTY_PAYLOAD};
use crate::storage::ExecutionLog;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use tracing::{debug, error, info, info_span, warn};

/// Anything that can produce an image of the current browser state.
///
/// Handed to [`ResultCapture::record_outcome`] per call by whatever owns the
/// browser session; `None` from the method means there is nothing to capture.
pub trait ScreenshotSource: Send + Sync {
    fn current_screenshot_bytes(&self) -> Option<Vec<u8>>;
}

/// Screenshot taken ahead of time and handed over as a file on disk.
#[derive(Debug, Clone)]
pub struct FileScreenshot {
    path: PathBuf,
}

impl FileScreenshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScreenshotSource for FileScreenshot {
    fn current_screenshot_bytes(&self) -> Option<Vec<u8>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "screenshot file unreadable");
                None
            }
        }
    }
}

/// Terminal event for one test, delivered once per test completion.
#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    pub test_name: String,
    pub status: TestStatus,
    pub category: TestType,
    pub user_story_id: Option<String>,
    pub test_case_id: Option<String>,
    /// Secondary label from the test declaration, used when no explicit
    /// test case id was supplied.
    pub description: Option<String>,
    pub request_payload: Option<String>,
    pub response_body: Option<String>,
}

impl TestOutcome {
    pub fn new(test_name: impl Into<String>, status: TestStatus, category: TestType) -> Self {
        Self {
            test_name: test_name.into(),
            status,
            category,
            user_story_id: None,
            test_case_id: None,
            description: None,
            request_payload: None,
            response_body: None,
        }
    }

    pub fn with_user_story_id(mut self, id: impl Into<String>) -> Self {
        self.user_story_id = Some(id.into());
        self
    }

    pub fn with_test_case_id(mut self, id: impl Into<String>) -> Self {
        self.test_case_id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_request_payload(mut self, payload: impl Into<String>) -> Self {
        self.request_payload = Some(payload.into());
        self
    }

    pub fn with_response_body(mut self, body: impl Into<String>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    /// Explicit id, then a non-empty description, then the test's own name.
    pub fn resolved_test_case_id(&self) -> &str {
        self.test_case_id
            .as_deref()
            .or_else(|| self.description.as_deref().filter(|d| !d.is_empty()))
            .unwrap_or(&self.test_name)
    }
}

/// What actually got persisted for one outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureReport {
    /// Id of the execution row, if it was written.
    pub record_id: Option<i64>,
    pub detail_saved: bool,
    /// Empty when no artifact was produced.
    pub artifact_path: String,
}

impl CaptureReport {
    pub fn is_complete(&self) -> bool {
        self.record_id.is_some() && self.detail_saved
    }
}

/// Listener-side entry point. Cheap to clone and safe to share across the
/// test framework's worker threads: it holds no mutable state of its own.
#[derive(Clone)]
pub struct ResultCapture {
    log: ExecutionLog,
    artifacts: ArtifactStore,
}

impl ResultCapture {
    pub fn new(log: ExecutionLog, artifacts: ArtifactStore) -> Self {
        Self { log, artifacts }
    }

    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn on_suite_start(&self, suite: &str) {
        info!(%suite, "test suite started");
    }

    pub fn on_suite_finish(&self, suite: &str) {
        info!(%suite, "test suite finished");
    }

    /// Record one finished test. Never panics outward and never errors.
    pub fn record_outcome(&self, event: &TestOutcome, session: Option<&dyn ScreenshotSource>) -> CaptureReport {
        let span = info_span!("record_outcome", test = %event.test_name, category = %event.category);
        let _enter = span.enter();

        match panic::catch_unwind(AssertUnwindSafe(|| self.capture(event, session))) {
            Ok(report) => report,
            Err(_) => {
                error!(status = %event.status, "panic while recording test outcome, outcome dropped");
                CaptureReport::default()
            }
        }
    }

    fn capture(&self, event: &TestOutcome, session: Option<&dyn ScreenshotSource>) -> CaptureReport {
        let request = event.request_payload.as_deref();
        let response = event.response_body.as_deref();

        let artifact_path = match event.category {
            TestType::Ui => match session.and_then(grab_screenshot) {
                Some(bytes) => self.artifacts.capture_screenshot(&event.test_name, &bytes),
                None => {
                    debug!("no screenshot available, recording without artifact");
                    String::new()
                }
            },
            TestType::Api => self.artifacts.capture_api_artifact(
                &event.test_name,
                request.unwrap_or(EMPTY_PAYLOAD),
                response.unwrap_or(EMPTY_PAYLOAD),
            ),
        };

        let record = ExecutionRecord::new(
            event.test_name.as_str(),
            event.status,
            event.category,
            event.user_story_id.as_deref(),
            Some(event.resolved_test_case_id()),
            artifact_path.as_str(),
            now_seconds(),
        );
        let detail = DetailRecord::for_record(&record, request, response);

        // Both writes are attempted regardless of the other's outcome.
        let record_id = match self.log.append(&record) {
            Ok(id) => Some(id),
            Err(e) => {
                error!(error = %e, "failed to append execution record");
                None
            }
        };
        let detail_saved = match self.log.append_detail(&detail) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "failed to append {} detail record", detail.test_type());
                false
            }
        };

        info!(
            status = %record.status,
            us_id = %record.user_story_id,
            tc_id = %record.test_case_id,
            saved = record_id.is_some() && detail_saved,
            "test outcome recorded"
        );

        CaptureReport {
            record_id,
            detail_saved,
            artifact_path,
        }
    }
}

fn grab_screenshot(source: &dyn ScreenshotSource) -> Option<Vec<u8>> {
    match panic::catch_unwind(AssertUnwindSafe(|| source.current_screenshot_bytes())) {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!("screenshot source panicked, treating as no screenshot");
            None
        }
    }
}
