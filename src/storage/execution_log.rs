//! Append-only execution log backed by the pooled SQLite database.
//!
//! Each call checks out its own connection and runs in autocommit mode.
//! There is no application-level lock: SQLite serializes writers, and
//! concurrent appends land in whatever order the database accepts them.

use super::{open_pool, Pool, StoreError};
use crate::model::{
    truncate_id, DetailRecord, ExecutionRecord, TestStatus, TestType, DB_TIME_FORMAT, MAX_TC_ID_LEN,
    MAX_US_ID_LEN,
};
use chrono::NaiveDateTime;
use rusqlite::params;
use std::path::Path;

#[derive(Clone)]
pub struct ExecutionLog {
    pool: Pool,
}

impl ExecutionLog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database at `path` and wrap it.
    pub fn open(path: &Path, busy_timeout_ms: u64) -> Result<Self, StoreError> {
        Ok(Self::new(open_pool(path, busy_timeout_ms)?))
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Append one execution record and return the id the store assigned.
    ///
    /// Identifying attributes are bounded here regardless of how the record
    /// was built.
    pub fn append(&self, record: &ExecutionRecord) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO execution_log (test_name, status, test_type, us_id, tc_id, artifact, execution_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.test_name,
                record.status.as_str(),
                record.test_type.as_str(),
                truncate_id(Some(&record.user_story_id), MAX_US_ID_LEN),
                truncate_id(Some(&record.test_case_id), MAX_TC_ID_LEN),
                record.artifact_path,
                record.execution_time.format(DB_TIME_FORMAT).to_string(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Append the category-specific detail row.
    ///
    /// Independent of [`ExecutionLog::append`]: the two writes are never
    /// wrapped in a shared transaction.
    pub fn append_detail(&self, detail: &DetailRecord) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        match detail {
            DetailRecord::Ui(d) => {
                conn.execute(
                    "INSERT INTO ui_tests (us_id, test_case_id, name, status, execution_time, artifact)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        truncate_id(Some(&d.user_story_id), MAX_US_ID_LEN),
                        truncate_id(Some(&d.test_case_id), MAX_TC_ID_LEN),
                        d.name,
                        d.status.as_str(),
                        d.execution_time.format(DB_TIME_FORMAT).to_string(),
                        d.artifact_path,
                    ],
                )?;
            }
            DetailRecord::Api(d) => {
                conn.execute(
                    "INSERT INTO api_responses (us_id, test_case_id, name, status, execution_time,
                                                request_payload, response_body, artifact)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        truncate_id(Some(&d.user_story_id), MAX_US_ID_LEN),
                        truncate_id(Some(&d.test_case_id), MAX_TC_ID_LEN),
                        d.name,
                        d.status.as_str(),
                        d.execution_time.format(DB_TIME_FORMAT).to_string(),
                        d.request_payload,
                        d.response_body,
                        d.artifact_path,
                    ],
                )?;
            }
        }
        Ok(())
    }

    /// Full scan of the log, oldest first.
    pub fn read_all(&self) -> Result<Vec<ExecutionRecord>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, test_name, status, test_type, us_id, tc_id, artifact, execution_time
             FROM execution_log
             ORDER BY execution_time ASC, id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(RawRow {
                id: row.get(0)?,
                test_name: row.get(1)?,
                status: row.get(2)?,
                test_type: row.get(3)?,
                us_id: row.get(4)?,
                tc_id: row.get(5)?,
                artifact: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                execution_time: row.get(7)?,
            })
        })?;

        let mut records = Vec::new();
        for r in rows {
            records.push(r?.into_record()?);
        }
        Ok(records)
    }

    /// Number of rows in the execution log.
    pub fn count(&self) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;
        let n = conn.query_row("SELECT COUNT(*) FROM execution_log", [], |row| row.get(0))?;
        Ok(n)
    }
}

struct RawRow {
    id: i64,
    test_name: String,
    status: String,
    test_type: String,
    us_id: String,
    tc_id: String,
    artifact: String,
    execution_time: String,
}

impl RawRow {
    fn into_record(self) -> Result<ExecutionRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            table: "execution_log",
            id: self.id,
            reason,
        };

        // Anything that is not PASS or FAIL lands in the skip bucket.
        let status = self.status.parse().unwrap_or(TestStatus::Skip);
        let test_type: TestType = self.test_type.parse().map_err(corrupt)?;
        let execution_time = NaiveDateTime::parse_from_str(&self.execution_time, DB_TIME_FORMAT)
            .map_err(|e| corrupt(format!("bad execution_time '{}': {}", self.execution_time, e)))?;

        Ok(ExecutionRecord {
            id: self.id,
            test_name: self.test_name,
            status,
            test_type,
            user_story_id: self.us_id,
            test_case_id: self.tc_id,
            artifact_path: self.artifact,
            execution_time,
        })
    }
}
