//! SQLite storage behind the history store.
//!
//! One connection per database, shared behind a mutex. File databases run
//! in WAL mode with `synchronous=FULL`, so an insert that returned has
//! reached the disk.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod history_repo;
pub mod migrations;

pub use error::DatabaseError;

/// How long a writer waits for another connection's lock on the same file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Memory,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Memory => f.write_str(":memory:"),
        }
    }
}

/// Shared handle to a migrated history database. Clones share the
/// connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    location: Arc<Location>,
}

impl Database {
    /// Opens or creates the database file at `path`, creating missing
    /// parent directories, and brings its schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        apply_durability(&conn)?;
        Self::migrated(conn, Location::File(path.to_path_buf()))
    }

    /// A private database that disappears with the handle.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::migrated(Connection::open_in_memory()?, Location::Memory)
    }

    fn migrated(mut conn: Connection, location: Location) -> Result<Self, DatabaseError> {
        migrations::run_all(&mut conn)?;
        log::info!(
            "History database ready at {} (schema v{})",
            location,
            migrations::current_version(&conn)?
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: Arc::new(location),
        })
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Schema version recorded in the database header.
    pub fn schema_version(&self) -> Result<u32, DatabaseError> {
        self.with_conn(migrations::current_version)
    }

    /// Runs `f` with exclusive access to the connection.
    ///
    /// A poisoned lock is recovered: every statement is atomic in SQLite,
    /// so a panic elsewhere cannot leave a half-written row behind.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        f(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Database lock for {} was poisoned, recovering", self.location);
                poisoned.into_inner()
            }
        }
    }
}

fn apply_durability(conn: &Connection) -> Result<(), DatabaseError> {
    // journal_mode answers with a row, which execute_batch discards.
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

/// `~/.voiceforge/data/voiceforge.db`, or `None` without a home directory.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".voiceforge").join("data").join("voiceforge.db"))
}
