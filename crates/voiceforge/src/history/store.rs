//! Durable history of finished jobs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::db::history_repo;
use crate::db::{Database, DatabaseError};
use crate::error::HistoryError;
use crate::history::record::{HistoryFilter, HistoryRecord};

fn is_constraint_violation(err: &DatabaseError) -> bool {
    matches!(
        err,
        DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// History store backed by rusqlite with an in-memory mirror.
///
/// The mirror is filled at open, so `list` never touches the database.
/// Writes hold the cache write lock across the database call, which
/// serializes `append` and `remove`.
pub struct HistoryStore {
    /// Database handle (clone is cheap, inner `Arc`).
    db: Database,
    cache: RwLock<HashMap<String, HistoryRecord>>,
}

impl HistoryStore {
    /// Opens the store at `path`, creating the database if needed.
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        Self::from_database(Database::open(path)?)
    }

    /// A store that lives only as long as the process.
    pub fn in_memory() -> Result<Self, HistoryError> {
        Self::from_database(Database::open_in_memory()?)
    }

    /// Wraps an open database and loads every record.
    ///
    /// Rows that cannot be decoded are logged and left out of the mirror.
    pub fn from_database(db: Database) -> Result<Self, HistoryError> {
        let rows = history_repo::load_all(&db)?;
        let mut cache = HashMap::with_capacity(rows.len());
        for row in &rows {
            match HistoryRecord::from_row(row) {
                Ok(record) => {
                    cache.insert(record.job_id.clone(), record);
                }
                Err(e) => log::error!("Skipping unreadable history row: {}", e),
            }
        }

        log::info!(
            "Loaded {} history record(s) from {}",
            cache.len(),
            db.location()
        );

        Ok(Self {
            db,
            cache: RwLock::new(cache),
        })
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<String, HistoryRecord>> {
        match self.cache.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("History cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<String, HistoryRecord>> {
        match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("History cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Stores `record`. Durable once this returns.
    ///
    /// # Errors
    /// `HistoryError::Duplicate` if a record with the same job id exists;
    /// `HistoryError::Storage` if the database write fails.
    pub fn append(&self, record: HistoryRecord) -> Result<(), HistoryError> {
        let mut cache = self.write_cache();
        if cache.contains_key(&record.job_id) {
            return Err(HistoryError::Duplicate(record.job_id));
        }

        if let Err(e) = history_repo::insert(&self.db, &record.to_row()) {
            if is_constraint_violation(&e) {
                return Err(HistoryError::Duplicate(record.job_id));
            }
            return Err(e.into());
        }

        log::debug!(
            "History record appended for job {} ({})",
            record.job_id,
            record.status
        );
        cache.insert(record.job_id.clone(), record);
        Ok(())
    }

    /// Records matching `filter`, most recent first.
    pub fn list(&self, filter: HistoryFilter) -> Vec<HistoryRecord> {
        let cache = self.read_cache();
        let mut records: Vec<HistoryRecord> = cache
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.recency()
                .cmp(&a.recency())
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        records
    }

    /// Deletes a record. Removing an absent id is not an error.
    ///
    /// Returns whether a record was removed.
    pub fn remove(&self, job_id: &str) -> Result<bool, HistoryError> {
        let mut cache = self.write_cache();
        let deleted = history_repo::delete(&self.db, job_id)?;
        let cached = cache.remove(job_id).is_some();
        if deleted > 0 || cached {
            log::debug!("History record removed for job {}", job_id);
        }
        Ok(deleted > 0 || cached)
    }

    pub fn get(&self, job_id: &str) -> Option<HistoryRecord> {
        self.read_cache().get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read_cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
