//! Schema versions, tracked in SQLite's `user_version` header field.
//!
//! Each step runs in its own transaction together with the version bump,
//! so a failed step leaves the previous version intact.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const CREATE_HISTORY: &str = "
CREATE TABLE IF NOT EXISTS history (
    job_id          TEXT PRIMARY KEY NOT NULL,
    kind            TEXT NOT NULL,
    status          TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    completed_at    TEXT,
    item_count      INTEGER NOT NULL,
    succeeded_count INTEGER NOT NULL,
    failed_count    INTEGER NOT NULL,
    skipped_count   INTEGER NOT NULL DEFAULT 0,
    format          TEXT NOT NULL,
    quality         TEXT NOT NULL,
    download_ref    TEXT,
    size_bytes      INTEGER,
    duration_secs   REAL
);
CREATE INDEX IF NOT EXISTS idx_history_recency
    ON history (COALESCE(completed_at, created_at) DESC, created_at DESC);
";

/// Ordered by version. Append only.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "create history table",
    sql: CREATE_HISTORY,
}];

/// Version of the newest schema this build knows.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

pub fn current_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.pragma_query_value(None, "user_version", |r| r.get(0))?)
}

/// Applies every step newer than the stored version.
///
/// Refuses a database whose version is newer than `latest_version`, since
/// rows written by a later build may not decode here.
pub fn run_all(conn: &mut Connection) -> Result<(), DatabaseError> {
    let current = current_version(conn)?;
    let latest = latest_version();
    if current > latest {
        return Err(DatabaseError::Migration {
            version: current,
            reason: format!("schema v{} is newer than this build (v{})", current, latest),
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        log::info!(
            "Migrating history schema to v{}: {}",
            migration.version,
            migration.description
        );
        let failed = |e: rusqlite::Error| DatabaseError::Migration {
            version: migration.version,
            reason: e.to_string(),
        };

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.pragma_update(None, "user_version", migration.version)
            .map_err(failed)?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_reaches_latest() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(current_version(&conn).unwrap(), 0);

        run_all(&mut conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());

        let columns: Vec<String> = conn
            .prepare("SELECT name FROM pragma_table_info('history')")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(columns.iter().any(|c| c == "duration_secs"));
        assert!(columns.iter().any(|c| c == "skipped_count"));
    }

    #[test]
    fn test_rerun_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_all(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO history (job_id, kind, status, created_at, item_count, succeeded_count,
             failed_count, format, quality)
             VALUES ('kept', 'single', 'completed', '2026-01-01T00:00:00.000000Z', 1, 1, 0, 'mp3', 'high')",
            [],
        )
        .unwrap();

        run_all(&mut conn).unwrap();
        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM history", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", latest_version() + 1)
            .unwrap();

        match run_all(&mut conn) {
            Err(DatabaseError::Migration { version, reason }) => {
                assert_eq!(version, latest_version() + 1);
                assert!(reason.contains("newer than this build"));
            }
            other => panic!("expected a migration error, got {:?}", other),
        }
        // Nothing was created.
        let tables: u32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'history'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }
}
