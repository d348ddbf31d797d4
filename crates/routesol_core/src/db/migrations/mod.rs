//! Document store schema migrations.
//!
//! # Responsibility
//! - List the schema steps of the `documents` store in order.
//! - Bring a database up to the schema this binary understands.
//!
//! # Invariants
//! - Step versions are contiguous, starting at 1.
//! - `PRAGMA user_version` equals the last applied step.
//! - A database newer than this binary is never written to.
//! - Pending steps are applied in one transaction; a failed step applies none.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

/// One schema step.
#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "documents",
        sql: include_str!("0001_documents.sql"),
    },
    SchemaStep {
        version: 2,
        name: "users_username_unique",
        sql: include_str!("0002_users_username_unique.sql"),
    },
];

/// Schema version written by the last known step.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.len() as u32
}

/// Names of the steps a database at `version` still needs.
pub fn pending_steps(version: u32) -> Vec<&'static str> {
    steps_after(version).iter().map(|step| step.name).collect()
}

/// Applies every step above the stored schema version.
///
/// Returns the number of steps applied; zero for an up-to-date database.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the database is newer than
///   [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<u32> {
    let stored: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if stored > latest_version() {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: stored,
            latest_supported: latest_version(),
        });
    }

    let pending = steps_after(stored);
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
    }
    tx.commit()?;

    Ok(pending.len() as u32)
}

fn steps_after(version: u32) -> &'static [SchemaStep] {
    let applied = (version as usize).min(SCHEMA_STEPS.len());
    &SCHEMA_STEPS[applied..]
}
