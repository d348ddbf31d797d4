//! Document store bootstrap, connection lifecycle and collection access.
//!
//! # Responsibility
//! - Open and configure SQLite connections backing the document store.
//! - Apply schema migrations in deterministic order.
//! - Hand out per-operation handles and expose JSON document collections.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write documents before migrations succeed.
//! - Every handle acquired through [`ConnectionManager`] is released exactly
//!   once; a second release only emits a warning.

use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod collection;
pub mod connection;
pub mod migrations;
mod open;

pub use collection::{Collection, DocKey};
pub use connection::{CollectionSummary, ConnectionManager, ConnectionTarget, DbHandle};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// Connection string could not be interpreted.
    InvalidConnectionString(String),
    /// Store unreachable or refused the connection.
    Connectivity {
        target: String,
        source: rusqlite::Error,
    },
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A stored document could not be decoded.
    InvalidDocument(String),
    /// Handle was used after release.
    HandleReleased,
}

impl DbError {
    /// Returns whether this error means the store itself could not be reached
    /// or used, as opposed to a failure of one particular statement.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Connectivity { .. } | Self::HandleReleased => true,
            Self::Sqlite(err) => is_connectivity_failure(err),
            _ => false,
        }
    }

    /// Returns whether this error is a primary-key or unique-index violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == ErrorCode::ConstraintViolation
                    && matches!(
                        err.extended_code,
                        rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                            | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    )
            }
            _ => false,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConnectionString(message) => {
                write!(f, "invalid connection string: {message}")
            }
            Self::Connectivity { target, source } => {
                write!(f, "document store `{target}` is unreachable: {source}")
            }
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::InvalidDocument(message) => write!(f, "invalid stored document: {message}"),
            Self::HandleReleased => write!(f, "connection handle was already released"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connectivity { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

fn is_connectivity_failure(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.code,
            ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::NotADatabase
                | ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly
                | ErrorCode::FileLockingProtocolFailed
        ),
        _ => false,
    }
}
