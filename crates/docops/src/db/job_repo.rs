//! Job repository: CRUD operations for the `jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub file_id: Option<String>,
    pub source_path: String,
    pub family: String,
    pub status: String,
    /// JSON array of operations.
    pub operations: String,
    pub output_filename: String,
    pub result_path: Option<String>,
    pub output_dir: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    /// JSON array of step outcomes.
    pub steps: String,
    pub cleanup_scheduled: bool,
    pub submitted_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            file_id: row.get("file_id")?,
            source_path: row.get("source_path")?,
            family: row.get("family")?,
            status: row.get("status")?,
            operations: row.get("operations")?,
            output_filename: row.get("output_filename")?,
            result_path: row.get("result_path")?,
            output_dir: row.get("output_dir")?,
            message: row.get("message")?,
            error: row.get("error")?,
            steps: row.get("steps")?,
            cleanup_scheduled: row.get("cleanup_scheduled")?,
            submitted_at: row.get("submitted_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, file_id, source_path, family, status, operations,
             output_filename, result_path, output_dir, message, error, steps,
             cleanup_scheduled, submitted_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                job.id,
                job.file_id,
                job.source_path,
                job.family,
                job.status,
                job.operations,
                job.output_filename,
                job.result_path,
                job.output_dir,
                job.message,
                job.error,
                job.steps,
                job.cleanup_scheduled,
                job.submitted_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Overwrites the mutable columns of a job. `cleanup_scheduled` only ever
/// goes from 0 to 1, through [`mark_cleanup_scheduled`].
pub fn update(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET status=?2, result_path=?3, output_dir=?4, message=?5,
             error=?6, steps=?7, completed_at=?8
             WHERE id=?1",
            params![
                job.id,
                job.status,
                job.result_path,
                job.output_dir,
                job.message,
                job.error,
                job.steps,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Counts jobs for `source_path` whose status is one of `statuses`.
pub fn count_for_source(
    db: &Database,
    source_path: &str,
    statuses: &[&str],
) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let placeholders: Vec<String> = (0..statuses.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "SELECT COUNT(*) FROM jobs WHERE source_path = ?1 AND status IN ({})",
            placeholders.join(", ")
        );

        let mut values: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(statuses.len() + 1);
        values.push(&source_path);
        for status in statuses {
            values.push(status);
        }

        let count: u64 = conn.query_row(&sql, values.as_slice(), |r| r.get(0))?;
        Ok(count)
    })
}

/// Sets `cleanup_scheduled` if it was not set. Returns true when this
/// call changed it.
pub fn mark_cleanup_scheduled(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET cleanup_scheduled = 1 WHERE id = ?1 AND cleanup_scheduled = 0",
            params![id],
        )?;
        Ok(changed == 1)
    })
}
