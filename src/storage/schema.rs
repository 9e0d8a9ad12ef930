//! Database schema and migrations.

use rusqlite::Connection;

/// Current schema revision recorded in `schema_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS execution_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            test_name TEXT NOT NULL,
            status TEXT NOT NULL,
            test_type TEXT NOT NULL,
            us_id TEXT NOT NULL DEFAULT 'N/A',
            tc_id TEXT NOT NULL DEFAULT 'N/A',
            artifact TEXT NOT NULL DEFAULT '',
            execution_time TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ui_tests (
            id INTEGER PRIMARY KEY,
            us_id TEXT NOT NULL,
            test_case_id TEXT NOT NULL,
            name TEXT NOT NULL,
            status TEXT NOT NULL,
            execution_time TEXT NOT NULL,
            artifact TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS api_responses (
            id INTEGER PRIMARY KEY,
            us_id TEXT NOT NULL,
            test_case_id TEXT NOT NULL,
            name TEXT NOT NULL,
            status TEXT NOT NULL,
            execution_time TEXT NOT NULL,
            request_payload TEXT NOT NULL DEFAULT '{}',
            response_body TEXT NOT NULL DEFAULT '{}',
            artifact TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_execution_log_time ON execution_log(execution_time);",
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}
