//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::harvest::Record;
use crate::state::JobStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{InsertOutcome, JobRecord, RunRecord, RunStatus};
use crate::ScoutError;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const JOB_COLUMNS: &str = "job_id, source, search_term, status, created_at, started_at,
     completed_at, item_count, failure_reason";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(ScoutError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ScoutError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, ScoutError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self { conn })
    }

    fn set_job_status(
        &mut self,
        job_id: i64,
        sql: &str,
        values: &[&dyn rusqlite::ToSql],
    ) -> StorageResult<()> {
        let changed = self.conn.execute(sql, values)?;
        if changed == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }
}

/// Conversion error for a status column holding a value no variant maps to
fn unknown_status(column: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        format!("unknown status '{}'", value).into(),
    )
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    let status: String = row.get(3)?;
    Ok(JobRecord {
        job_id: row.get(0)?,
        source: row.get(1)?,
        search_term: row.get(2)?,
        status: JobStatus::from_db_string(&status).ok_or_else(|| unknown_status(3, &status))?,
        created_at: row.get(4)?,
        started_at: row.get(5)?,
        completed_at: row.get(6)?,
        item_count: row.get::<_, Option<i64>>(7)?.map(|n| n.max(0) as u64),
        failure_reason: row.get(8)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
        )?;

        let run = stmt
            .query_row(params![run_id], |row| {
                let status: String = row.get(4)?;
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&status)
                        .ok_or_else(|| unknown_status(4, &status))?,
                })
            })
            .optional()?;

        run.ok_or(StorageError::RunNotFound(run_id))
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Job Management =====

    fn create_job(&mut self, source: &str, search_term: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO jobs (source, search_term, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![source, search_term, JobStatus::Pending.to_db_string(), now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<Option<JobRecord>> {
        let sql = format!("SELECT {} FROM jobs WHERE job_id = ?1", JOB_COLUMNS);
        let job = self
            .conn
            .query_row(&sql, params![job_id], job_from_row)
            .optional()?;
        Ok(job)
    }

    fn start_job(&mut self, job_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.set_job_status(
            job_id,
            "UPDATE jobs SET status = ?1, started_at = ?2 WHERE job_id = ?3",
            params![JobStatus::Running.to_db_string(), now, job_id],
        )
    }

    fn complete_job(&mut self, job_id: i64, item_count: u64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let item_count = i64::try_from(item_count).unwrap_or(i64::MAX);
        self.set_job_status(
            job_id,
            "UPDATE jobs SET status = ?1, completed_at = ?2, item_count = ?3 WHERE job_id = ?4",
            params![JobStatus::Completed.to_db_string(), now, item_count, job_id],
        )
    }

    fn fail_job(&mut self, job_id: i64, reason: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.set_job_status(
            job_id,
            "UPDATE jobs SET status = ?1, completed_at = ?2, failure_reason = ?3 WHERE job_id = ?4",
            params![JobStatus::Failed.to_db_string(), now, reason, job_id],
        )
    }

    fn list_pending_jobs(&self) -> StorageResult<Vec<JobRecord>> {
        let sql = format!(
            "SELECT {} FROM jobs WHERE status = ?1 ORDER BY job_id",
            JOB_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params![JobStatus::Pending.to_db_string()], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    // ===== Records =====

    fn insert_record(&mut self, record: &Record) -> StorageResult<InsertOutcome> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO products
             (name, price_raw, price, link, image, availability, availability_status,
              scrape_time, search_term, source, job_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.name,
                record.price_raw,
                record.price,
                record.link,
                record.image,
                record.availability,
                record.availability_status.to_db_string(),
                record.scraped_at.to_rfc3339(),
                record.search_term,
                record.source,
                record.job_id
            ],
        )?;

        if changed == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    // ===== Statistics =====

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_jobs_by_status(&self, status: JobStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_records_by_source(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT source, COUNT(*) FROM products GROUP BY source ORDER BY source",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
