//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations and a liveness check before returning a
//!   usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations fully applied.
//! - Missing parent directories are never created; they surface as
//!   connectivity failures.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use crate::logging::LogChannel;
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Creates the database file when its directory exists but the file does not.
/// - Emits `db_open` logging events with duration and status on `log`.
pub fn open_db(path: impl AsRef<Path>, log: &LogChannel) -> DbResult<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();
    info!(
        target: log.target(),
        "event=db_open module={} status=start mode=file",
        log.module()
    );

    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let mut conn = match Connection::open_with_flags(path, flags) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                target: log.target(),
                "event=db_open module={} status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                log.module(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(DbError::Connectivity {
                target: path.display().to_string(),
                source: err,
            });
        }
    };

    match bootstrap_connection(&mut conn) {
        Ok(applied) => {
            info!(
                target: log.target(),
                "event=db_open module={} status=ok mode=file duration_ms={} migrations_applied={}",
                log.module(),
                started_at.elapsed().as_millis(),
                applied
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                target: log.target(),
                "event=db_open module={} status=error mode=file duration_ms={} error_code=db_bootstrap_failed error={}",
                log.module(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(match err {
                DbError::Sqlite(source) if super::is_connectivity_failure(&source) => {
                    DbError::Connectivity {
                        target: path.display().to_string(),
                        source,
                    }
                }
                other => other,
            })
        }
    }
}

/// Opens an in-memory SQLite database and applies all pending migrations.
///
/// The database lives only as long as the returned connection, so this is
/// meant for tests driving repositories over a single connection.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let mut conn = Connection::open_in_memory()?;
    bootstrap_connection(&mut conn)?;
    Ok(conn)
}

/// Returns the number of schema steps applied.
fn bootstrap_connection(conn: &mut Connection) -> DbResult<u32> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    let applied = apply_migrations(conn)?;
    conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))?;
    Ok(applied)
}
