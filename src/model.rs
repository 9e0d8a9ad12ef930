//! Core record types shared by capture, storage, and reporting.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum stored length (in characters) of a user story id.
pub const MAX_US_ID_LEN: usize = 50;
/// Maximum stored length (in characters) of a test case id.
pub const MAX_TC_ID_LEN: usize = 255;
/// Placeholder stored when an identifying attribute is absent.
pub const NOT_AVAILABLE: &str = "N/A";
/// Placeholder used for API bodies the test did not supply.
pub const EMPTY_PAYLOAD: &str = "{}";

/// Storage text format for execution timestamps.
pub const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// File-name stamp format for artifacts and reports.
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Skip => "SKIP",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASS" => Ok(TestStatus::Pass),
            "FAIL" => Ok(TestStatus::Fail),
            "SKIP" => Ok(TestStatus::Skip),
            other => Err(format!("unknown test status '{}'", other)),
        }
    }
}

/// Test category. Decides which artifact and detail-record path is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestType {
    Ui,
    Api,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Ui => "UI",
            TestType::Api => "API",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UI" => Ok(TestType::Ui),
            "API" => Ok(TestType::Api),
            other => Err(format!("unknown test type '{}'", other)),
        }
    }
}

/// One row summarizing a single test's outcome and identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    /// Store-assigned id; `0` until the record has been appended.
    pub id: i64,
    pub test_name: String,
    pub status: TestStatus,
    pub test_type: TestType,
    pub user_story_id: String,
    pub test_case_id: String,
    /// Empty when capture failed or was skipped, never null.
    pub artifact_path: String,
    pub execution_time: NaiveDateTime,
}

impl ExecutionRecord {
    /// Build an unsaved record. Identifying attributes are truncated here so
    /// every path into the store sees the same bounded values.
    pub fn new(
        test_name: impl Into<String>,
        status: TestStatus,
        test_type: TestType,
        user_story_id: Option<&str>,
        test_case_id: Option<&str>,
        artifact_path: impl Into<String>,
        execution_time: NaiveDateTime,
    ) -> Self {
        Self {
            id: 0,
            test_name: test_name.into(),
            status,
            test_type,
            user_story_id: truncate_id(user_story_id, MAX_US_ID_LEN),
            test_case_id: truncate_id(test_case_id, MAX_TC_ID_LEN),
            artifact_path: artifact_path.into(),
            execution_time: truncate_to_seconds(execution_time),
        }
    }
}

/// UI elaboration of an execution record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiDetailRecord {
    pub user_story_id: String,
    pub test_case_id: String,
    pub name: String,
    pub status: TestStatus,
    pub execution_time: NaiveDateTime,
    pub artifact_path: String,
}

/// API elaboration of an execution record, carrying the raw exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiDetailRecord {
    pub user_story_id: String,
    pub test_case_id: String,
    pub name: String,
    pub status: TestStatus,
    pub execution_time: NaiveDateTime,
    pub request_payload: String,
    pub response_body: String,
    pub artifact_path: String,
}

/// Category-specific detail row. Exactly one exists per execution record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DetailRecord {
    Ui(UiDetailRecord),
    Api(ApiDetailRecord),
}

impl DetailRecord {
    pub fn test_type(&self) -> TestType {
        match self {
            DetailRecord::Ui(_) => TestType::Ui,
            DetailRecord::Api(_) => TestType::Api,
        }
    }

    /// Build the detail row matching `record.test_type`. API bodies default
    /// to an empty object literal.
    pub fn for_record(
        record: &ExecutionRecord,
        request_payload: Option<&str>,
        response_body: Option<&str>,
    ) -> Self {
        match record.test_type {
            TestType::Ui => DetailRecord::Ui(UiDetailRecord {
                user_story_id: record.user_story_id.clone(),
                test_case_id: record.test_case_id.clone(),
                name: record.test_name.clone(),
                status: record.status,
                execution_time: record.execution_time,
                artifact_path: record.artifact_path.clone(),
            }),
            TestType::Api => DetailRecord::Api(ApiDetailRecord {
                user_story_id: record.user_story_id.clone(),
                test_case_id: record.test_case_id.clone(),
                name: record.test_name.clone(),
                status: record.status,
                execution_time: record.execution_time,
                request_payload: request_payload.unwrap_or(EMPTY_PAYLOAD).to_string(),
                response_body: response_body.unwrap_or(EMPTY_PAYLOAD).to_string(),
                artifact_path: record.artifact_path.clone(),
            }),
        }
    }
}

/// Bound an identifying attribute to `max` characters; `None` becomes `"N/A"`.
pub fn truncate_id(value: Option<&str>, max: usize) -> String {
    match value {
        None => NOT_AVAILABLE.to_string(),
        Some(v) => match v.char_indices().nth(max) {
            Some((cut, _)) => v[..cut].to_string(),
            None => v.to_string(),
        },
    }
}

/// Current local time at second precision.
pub fn now_seconds() -> NaiveDateTime {
    truncate_to_seconds(Local::now().naive_local())
}

pub fn truncate_to_seconds(t: NaiveDateTime) -> NaiveDateTime {
    t.with_nanosecond(0).unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_milli_opt(14, 5, 7, 812)
            .unwrap()
    }

    #[test]
    fn test_truncate_none_is_not_available() {
        assert_eq!(truncate_id(None, MAX_US_ID_LEN), "N/A");
        assert_eq!(truncate_id(None, MAX_TC_ID_LEN), "N/A");
    }

    #[test]
    fn test_truncate_keeps_first_n_chars() {
        let long = "x".repeat(300);
        assert_eq!(truncate_id(Some(&long), MAX_US_ID_LEN).len(), 50);
        assert_eq!(truncate_id(Some(&long), MAX_TC_ID_LEN).len(), 255);
        assert_eq!(truncate_id(Some("US-1"), MAX_US_ID_LEN), "US-1");
        assert_eq!(truncate_id(Some(""), MAX_US_ID_LEN), "");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "é".repeat(60);
        let out = truncate_id(Some(&s), MAX_US_ID_LEN);
        assert_eq!(out.chars().count(), 50);
    }

    #[test]
    fn test_status_and_type_parse_case_insensitively() {
        assert_eq!("pass".parse::<TestStatus>().unwrap(), TestStatus::Pass);
        assert_eq!(" Fail ".parse::<TestStatus>().unwrap(), TestStatus::Fail);
        assert_eq!("SKIP".parse::<TestStatus>().unwrap(), TestStatus::Skip);
        assert!("broken".parse::<TestStatus>().is_err());
        assert_eq!("ui".parse::<TestType>().unwrap(), TestType::Ui);
        assert_eq!("API".parse::<TestType>().unwrap(), TestType::Api);
        assert_eq!(TestStatus::Fail.to_string(), "FAIL");
        assert_eq!(TestType::Api.to_string(), "API");
    }

    #[test]
    fn test_record_new_normalizes_fields() {
        let long_tc = "t".repeat(400);
        let rec = ExecutionRecord::new(
            "login_test",
            TestStatus::Fail,
            TestType::Ui,
            None,
            Some(&long_tc),
            "",
            ts(),
        );
        assert_eq!(rec.id, 0);
        assert_eq!(rec.user_story_id, "N/A");
        assert_eq!(rec.test_case_id.len(), MAX_TC_ID_LEN);
        assert_eq!(rec.execution_time.nanosecond(), 0);
        assert_eq!(rec.artifact_path, "");
    }

    #[test]
    fn test_detail_matches_record_type() {
        let rec = ExecutionRecord::new("get_user", TestStatus::Pass, TestType::Api, Some("US-7"), None, "a.json", ts());
        match DetailRecord::for_record(&rec, None, Some("{\"id\":1}")) {
            DetailRecord::Api(d) => {
                assert_eq!(d.request_payload, "{}");
                assert_eq!(d.response_body, "{\"id\":1}");
                assert_eq!(d.name, "get_user");
                assert_eq!(d.artifact_path, "a.json");
            }
            other => panic!("expected API detail, got {:?}", other),
        }

        let rec = ExecutionRecord::new("login", TestStatus::Pass, TestType::Ui, None, None, "", ts());
        let detail = DetailRecord::for_record(&rec, Some("ignored"), None);
        assert_eq!(detail.test_type(), TestType::Ui);
    }
}
