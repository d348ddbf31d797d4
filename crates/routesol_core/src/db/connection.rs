//! Per-operation connection lifecycle.
//!
//! # Responsibility
//! - Resolve the configured connection string into a database target.
//! - Acquire a fresh handle for each operation and release it explicitly.
//! - Verify reachability and report what the store currently holds.
//!
//! # Invariants
//! - No pooling: every `acquire` opens a new connection.
//! - `scoped` releases its handle on every exit path before returning.
//! - Releasing an already released handle is a no-op plus a warning.

use super::open::open_db;
use super::{DbError, DbResult};
use crate::logging::LogChannel;
use log::{error, info, warn};
use rusqlite::Connection;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const SQLITE_SCHEME: &str = "sqlite://";
const FILE_SCHEME: &str = "file:";

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Database location parsed from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    path: PathBuf,
}

impl ConnectionTarget {
    /// Parses `sqlite://<path>`, `file:<path>` or a bare path.
    ///
    /// In-memory databases are rejected because they would not survive the
    /// per-operation connection lifecycle.
    pub fn parse(connection_string: &str) -> DbResult<Self> {
        let trimmed = connection_string.trim();
        let raw_path = trimmed
            .strip_prefix(SQLITE_SCHEME)
            .or_else(|| trimmed.strip_prefix(FILE_SCHEME))
            .unwrap_or(trimmed);
        let raw_path = raw_path.split('?').next().unwrap_or_default();

        if raw_path.is_empty() {
            return Err(DbError::InvalidConnectionString(
                "database path must not be empty".to_string(),
            ));
        }
        if raw_path == ":memory:" {
            return Err(DbError::InvalidConnectionString(
                "in-memory databases do not persist across connections".to_string(),
            ));
        }

        Ok(Self {
            path: PathBuf::from(raw_path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Display for ConnectionTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", SQLITE_SCHEME, self.path.display())
    }
}

/// Exclusive, explicitly released connection handle.
pub struct DbHandle {
    id: u64,
    conn: Option<Connection>,
    log: LogChannel,
}

impl DbHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Borrows the live connection, failing once the handle was released.
    pub fn connection(&self) -> DbResult<&Connection> {
        self.conn.as_ref().ok_or(DbError::HandleReleased)
    }
}

impl Drop for DbHandle {
    fn drop(&mut self) {
        if self.conn.take().is_some() {
            warn!(
                target: self.log.target(),
                "event=db_release module={} status=warn handle={} reason=dropped_without_release",
                self.log.module(),
                self.id
            );
        }
    }
}

/// Document count for one `(namespace, collection)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub namespace: String,
    pub collection: String,
    pub documents: u64,
}

/// Opens and closes store handles for individual operations.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    target: ConnectionTarget,
    log: LogChannel,
}

impl ConnectionManager {
    /// Builds a manager for `connection_string`, logging on `log`.
    ///
    /// # Errors
    /// - Returns `DbError::InvalidConnectionString` for empty or in-memory targets.
    pub fn new(connection_string: &str, log: LogChannel) -> DbResult<Self> {
        Ok(Self {
            target: ConnectionTarget::parse(connection_string)?,
            log,
        })
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// Opens a fresh handle.
    ///
    /// # Errors
    /// - `DbError::Connectivity` when the database cannot be opened.
    /// - `DbError::UnsupportedSchemaVersion` for databases newer than this binary.
    pub fn acquire(&self) -> DbResult<DbHandle> {
        let conn = open_db(self.target.path(), &self.log)?;
        let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        info!(
            target: self.log.target(),
            "event=db_acquire module={} status=ok handle={} target={}",
            self.log.module(),
            id,
            self.target
        );
        Ok(DbHandle {
            id,
            conn: Some(conn),
            log: self.log,
        })
    }

    /// Closes `handle`. Releasing twice only logs a warning.
    pub fn release(&self, handle: &mut DbHandle) {
        match handle.conn.take() {
            Some(conn) => match conn.close() {
                Ok(()) => info!(
                    target: self.log.target(),
                    "event=db_release module={} status=ok handle={}",
                    self.log.module(),
                    handle.id
                ),
                Err((_conn, err)) => error!(
                    target: self.log.target(),
                    "event=db_release module={} status=error handle={} error={}",
                    self.log.module(),
                    handle.id,
                    err
                ),
            },
            None => warn!(
                target: self.log.target(),
                "event=db_release module={} status=warn handle={} reason=already_released",
                self.log.module(),
                handle.id
            ),
        }
    }

    /// Runs `op` on a freshly acquired connection and releases it afterwards,
    /// whatever `op` returned.
    pub fn scoped<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut handle = self.acquire()?;
        let result = match handle.connection() {
            Ok(conn) => op(conn),
            Err(err) => Err(err.into()),
        };
        self.release(&mut handle);
        result
    }

    /// Checks reachability and logs every namespace/collection with its size.
    pub fn verify(&self) -> DbResult<Vec<CollectionSummary>> {
        info!(
            target: self.log.target(),
            "event=db_verify module={} status=start target={}",
            self.log.module(),
            self.target
        );

        let result = self.scoped(|conn| -> DbResult<Vec<CollectionSummary>> {
            let mut stmt = conn.prepare(
                "SELECT namespace, collection, COUNT(*)
                 FROM documents
                 GROUP BY namespace, collection
                 ORDER BY namespace, collection;",
            )?;
            let summaries = stmt
                .query_map([], |row| {
                    Ok(CollectionSummary {
                        namespace: row.get(0)?,
                        collection: row.get(1)?,
                        documents: row.get::<_, i64>(2)?.max(0) as u64,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(summaries)
        });

        match &result {
            Ok(summaries) => {
                for summary in summaries {
                    info!(
                        target: self.log.target(),
                        "event=db_verify module={} status=ok namespace={} collection={} documents={}",
                        self.log.module(),
                        summary.namespace,
                        summary.collection,
                        summary.documents
                    );
                }
                info!(
                    target: self.log.target(),
                    "event=db_verify module={} status=ok collections={}",
                    self.log.module(),
                    summaries.len()
                );
            }
            Err(err) => error!(
                target: self.log.target(),
                "event=db_verify module={} status=error error={}",
                self.log.module(),
                err
            ),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionTarget;
    use crate::db::DbError;
    use std::path::Path;

    #[test]
    fn parse_accepts_schemes_and_bare_paths() {
        let sqlite = ConnectionTarget::parse("sqlite:///tmp/stores.db").unwrap();
        assert_eq!(sqlite.path(), Path::new("/tmp/stores.db"));

        let file = ConnectionTarget::parse("file:data/stores.db?mode=rwc").unwrap();
        assert_eq!(file.path(), Path::new("data/stores.db"));

        let bare = ConnectionTarget::parse("  stores.db ").unwrap();
        assert_eq!(bare.path(), Path::new("stores.db"));
    }

    #[test]
    fn parse_rejects_empty_and_memory_targets() {
        assert!(matches!(
            ConnectionTarget::parse("sqlite://"),
            Err(DbError::InvalidConnectionString(_))
        ));
        assert!(matches!(
            ConnectionTarget::parse(":memory:"),
            Err(DbError::InvalidConnectionString(_))
        ));
    }
}
