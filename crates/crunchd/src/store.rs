//! SQLite result sink.
//!
//! Insert-if-absent by content fingerprint: every insert is gated on an
//! exists-by-hash check, and a match is an intentional no-op rather than an
//! error. The store owns its connection; scans are single-writer, so no
//! pooling is needed.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

use cruncher_common::{CompatIssueRecord, LogAnalysisResult};

pub struct ResultStore {
    conn: Connection,
}

impl ResultStore {
    /// Open or create the database at `path`, creating parent directories
    /// and the schema as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database: {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL mode")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;

        let store = Self { conn };
        store.init_schema()?;
        debug!("result store ready at {}", path.display());
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS log_analysis_results (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    hash TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS system_info (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    result_id INTEGER NOT NULL REFERENCES log_analysis_results(id),
                    hostname TEXT NOT NULL,
                    os_version TEXT NOT NULL,
                    vm TEXT NOT NULL,
                    firmware_type TEXT NOT NULL,
                    manufacturer TEXT NOT NULL,
                    model TEXT NOT NULL,
                    bios_name TEXT NOT NULL,
                    bios_version TEXT NOT NULL,
                    bios_release_date TEXT NOT NULL,
                    total_memory INTEGER NOT NULL,
                    physical_cpus INTEGER NOT NULL,
                    logical_cpus INTEGER NOT NULL,
                    processor_manufacturer TEXT NOT NULL,
                    processor_name TEXT NOT NULL,
                    processor_caption TEXT NOT NULL,
                    processor_architecture TEXT NOT NULL,
                    processor_clock INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS operation_results (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    result_id INTEGER NOT NULL REFERENCES log_analysis_results(id),
                    seq INTEGER NOT NULL,
                    operation_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    executed INTEGER NOT NULL,
                    start_time TEXT,
                    end_time TEXT,
                    elapsed_ms INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS failures (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    result_id INTEGER NOT NULL REFERENCES log_analysis_results(id),
                    reason TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS uncomplete_actions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    result_id INTEGER NOT NULL REFERENCES log_analysis_results(id),
                    action_name TEXT,
                    start_time TEXT
                );

                CREATE TABLE IF NOT EXISTS compat_issues (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    hash TEXT NOT NULL UNIQUE,
                    computer_name TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS compat_issue_properties (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    issue_id INTEGER NOT NULL REFERENCES compat_issues(id),
                    name TEXT NOT NULL,
                    value TEXT NOT NULL,
                    ordinal INTEGER NOT NULL DEFAULT 0
                );
                "#,
            )
            .context("failed to initialize schema")?;
        Ok(())
    }

    pub fn log_analysis_exists(&self, hash: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM log_analysis_results WHERE hash = ?1",
                params![hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Store one log-analysis result. Returns false (and stores nothing)
    /// when a record with the same fingerprint already exists.
    pub fn insert_log_analysis(&mut self, result: &LogAnalysisResult) -> Result<bool> {
        if self.log_analysis_exists(&result.hash)? {
            info!("a record with the same hash already exists, skipping insertion");
            return Ok(false);
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO log_analysis_results (hash) VALUES (?1)",
            params![result.hash],
        )?;
        let result_id = tx.last_insert_rowid();

        let info = &result.system_info;
        tx.execute(
            "INSERT INTO system_info (
                result_id, hostname, os_version, vm, firmware_type,
                manufacturer, model, bios_name, bios_version, bios_release_date,
                total_memory, physical_cpus, logical_cpus,
                processor_manufacturer, processor_name, processor_caption,
                processor_architecture, processor_clock
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                result_id,
                info.hostname,
                info.os_version,
                info.vm,
                info.firmware_type,
                info.manufacturer,
                info.model,
                info.bios_name,
                info.bios_version,
                info.bios_release_date,
                info.total_memory,
                info.physical_cpus,
                info.logical_cpus,
                info.processor_manufacturer,
                info.processor_name,
                info.processor_caption,
                info.processor_architecture,
                info.processor_clock,
            ],
        )?;

        for (seq, operation) in result.results.iter().enumerate() {
            tx.execute(
                "INSERT INTO operation_results (
                    result_id, seq, operation_id, name, executed,
                    start_time, end_time, elapsed_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    result_id,
                    seq as i64,
                    operation.operation_id,
                    operation.name,
                    operation.executed,
                    operation.start_time,
                    operation.end_time,
                    operation.elapsed_ms as i64,
                ],
            )?;
        }

        for reason in &result.failures {
            tx.execute(
                "INSERT INTO failures (result_id, reason) VALUES (?1, ?2)",
                params![result_id, reason],
            )?;
        }

        tx.execute(
            "INSERT INTO uncomplete_actions (result_id, action_name, start_time)
             VALUES (?1, ?2, ?3)",
            params![
                result_id,
                result.uncomplete_action.action_name,
                result.uncomplete_action.start_time,
            ],
        )?;

        tx.commit()?;
        debug!("stored log analysis for {}", result.system_info.hostname);
        Ok(true)
    }

    pub fn compat_issues_exist(&self, hash: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM compat_issues WHERE hash = ?1",
                params![hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Store one compatibility-issue record. Returns false (and stores
    /// nothing) when a record with the same fingerprint already exists.
    pub fn insert_compat_issues(&mut self, record: &CompatIssueRecord) -> Result<bool> {
        if self.compat_issues_exist(&record.hash)? {
            info!("a record with the same hash already exists, skipping insertion");
            return Ok(false);
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO compat_issues (hash, computer_name) VALUES (?1, ?2)",
            params![record.hash, record.computer_name],
        )?;
        let issue_id = tx.last_insert_rowid();

        for list in &record.upgrade_issues {
            for property in &list.properties {
                tx.execute(
                    "INSERT INTO compat_issue_properties (issue_id, name, value, ordinal)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![issue_id, property.name, property.value, property.ordinal],
                )?;
            }
        }

        tx.commit()?;
        debug!("stored compatibility issues for {}", record.computer_name);
        Ok(true)
    }

    pub fn log_analysis_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM log_analysis_results", [], |row| {
                row.get(0)
            })?)
    }

    pub fn compat_issue_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM compat_issues", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cruncher_common::{
        OperationResult, PropertyEntity, PropertyListEntity, SystemInfo, UncompleteAction,
    };

    fn sample_result() -> LogAnalysisResult {
        LogAnalysisResult {
            system_info: SystemInfo {
                hostname: "HOST01".to_string(),
                ..SystemInfo::default()
            },
            results: vec![OperationResult {
                operation_id: 1,
                name: "Gather data".to_string(),
                executed: true,
                start_time: None,
                end_time: None,
                elapsed_ms: 1_000,
            }],
            failures: vec!["Disk read error".to_string()],
            uncomplete_action: UncompleteAction::default(),
            hash: "a".repeat(64),
        }
    }

    fn sample_record() -> CompatIssueRecord {
        CompatIssueRecord {
            computer_name: "DESKTOP-7".to_string(),
            upgrade_issues: vec![PropertyListEntity {
                type_name: Some("Inventory".to_string()),
                properties: vec![PropertyEntity {
                    name: "DeviceName".to_string(),
                    value: "Legacy Widget".to_string(),
                    ordinal: 0,
                }],
            }],
            hash: "b".repeat(64),
        }
    }

    #[test]
    fn test_insert_log_analysis_once() {
        let mut store = ResultStore::open_in_memory().unwrap();
        assert!(store.insert_log_analysis(&sample_result()).unwrap());
        assert!(!store.insert_log_analysis(&sample_result()).unwrap());
        assert_eq!(store.log_analysis_count().unwrap(), 1);
    }

    #[test]
    fn test_log_analysis_children_are_stored() {
        let mut store = ResultStore::open_in_memory().unwrap();
        store.insert_log_analysis(&sample_result()).unwrap();

        let operations: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM operation_results", [], |r| r.get(0))
            .unwrap();
        let failures: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM failures", [], |r| r.get(0))
            .unwrap();
        assert_eq!(operations, 1);
        assert_eq!(failures, 1);
    }

    #[test]
    fn test_insert_compat_issues_once() {
        let mut store = ResultStore::open_in_memory().unwrap();
        assert!(store.insert_compat_issues(&sample_record()).unwrap());
        assert!(!store.insert_compat_issues(&sample_record()).unwrap());
        assert_eq!(store.compat_issue_count().unwrap(), 1);

        let properties: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM compat_issue_properties", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(properties, 1);
    }

    #[test]
    fn test_different_hashes_both_stored() {
        let mut store = ResultStore::open_in_memory().unwrap();
        let mut second = sample_result();
        second.hash = "c".repeat(64);
        store.insert_log_analysis(&sample_result()).unwrap();
        store.insert_log_analysis(&second).unwrap();
        assert_eq!(store.log_analysis_count().unwrap(), 2);
    }
}
