//! File repository: uploaded source files.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: String,
    pub original_filename: String,
    pub stored_path: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub status: String,
    pub job_id: Option<String>,
    pub processed_path: Option<String>,
    pub uploaded_at: String,
}

impl FileRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            original_filename: row.get("original_filename")?,
            stored_path: row.get("stored_path")?,
            size_bytes: row.get("size_bytes")?,
            mime_type: row.get("mime_type")?,
            status: row.get("status")?,
            job_id: row.get("job_id")?,
            processed_path: row.get("processed_path")?,
            uploaded_at: row.get("uploaded_at")?,
        })
    }
}

pub fn insert(db: &Database, file: &FileRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO files (id, original_filename, stored_path, size_bytes, mime_type,
             status, job_id, processed_path, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                file.id,
                file.original_filename,
                file.stored_path,
                file.size_bytes,
                file.mime_type,
                file.status,
                file.job_id,
                file.processed_path,
                file.uploaded_at,
            ],
        )?;
        Ok(())
    })
}

pub fn update(db: &Database, file: &FileRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE files SET status=?2, job_id=?3, processed_path=?4 WHERE id=?1",
            params![file.id, file.status, file.job_id, file.processed_path],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<FileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM files WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], FileRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_update_find() {
        let db = Database::open_in_memory().unwrap();
        let mut row = FileRow {
            id: "f1".to_string(),
            original_filename: "report.docx".to_string(),
            stored_path: "/tmp/uploads/f1.docx".to_string(),
            size_bytes: 1234,
            mime_type: "application/octet-stream".to_string(),
            status: "uploaded".to_string(),
            job_id: None,
            processed_path: None,
            uploaded_at: "2026-01-01T00:00:00+00:00".to_string(),
        };
        insert(&db, &row).unwrap();

        row.status = "queued".to_string();
        row.job_id = Some("j1".to_string());
        update(&db, &row).unwrap();

        let found = find_by_id(&db, "f1").unwrap().unwrap();
        assert_eq!(found.status, "queued");
        assert_eq!(found.job_id.as_deref(), Some("j1"));
        assert_eq!(found.size_bytes, 1234);
        assert!(find_by_id(&db, "f2").unwrap().is_none());
    }
}
