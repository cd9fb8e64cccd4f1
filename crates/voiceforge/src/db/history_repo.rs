//! History repository: CRUD operations for the `history` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw history row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub job_id: String,
    pub kind: String,
    pub status: String,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub item_count: u32,
    pub succeeded_count: u32,
    pub failed_count: u32,
    pub skipped_count: u32,
    pub format: String,
    pub quality: String,
    pub download_ref: Option<String>,
    pub size_bytes: Option<i64>,
    pub duration_secs: Option<f64>,
}

impl HistoryRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            kind: row.get("kind")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            completed_at: row.get("completed_at")?,
            item_count: row.get("item_count")?,
            succeeded_count: row.get("succeeded_count")?,
            failed_count: row.get("failed_count")?,
            skipped_count: row.get("skipped_count")?,
            format: row.get("format")?,
            quality: row.get("quality")?,
            download_ref: row.get("download_ref")?,
            size_bytes: row.get("size_bytes")?,
            duration_secs: row.get("duration_secs")?,
        })
    }
}

/// Inserts a new history row.
pub fn insert(db: &Database, row: &HistoryRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO history (job_id, kind, status, created_at, completed_at, item_count,
             succeeded_count, failed_count, skipped_count, format, quality, download_ref,
             size_bytes, duration_secs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                row.job_id,
                row.kind,
                row.status,
                row.created_at,
                row.completed_at,
                row.item_count,
                row.succeeded_count,
                row.failed_count,
                row.skipped_count,
                row.format,
                row.quality,
                row.download_ref,
                row.size_bytes,
                row.duration_secs,
            ],
        )?;
        Ok(())
    })
}

/// Deletes a row by job id. Returns the number of rows removed (0 or 1).
pub fn delete(db: &Database, job_id: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let removed = conn.execute("DELETE FROM history WHERE job_id = ?1", params![job_id])?;
        Ok(removed)
    })
}

/// Finds a row by job id.
pub fn find_by_id(db: &Database, job_id: &str) -> Result<Option<HistoryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM history WHERE job_id = ?1")?;
        let mut rows = stmt.query_map(params![job_id], HistoryRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Loads every row, most recent first.
pub fn load_all(db: &Database) -> Result<Vec<HistoryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM history
             ORDER BY COALESCE(completed_at, created_at) DESC, created_at DESC",
        )?;
        let rows = stmt
            .query_map([], HistoryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts all rows.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM history", [], |r| r.get(0))?;
        Ok(count)
    })
}
