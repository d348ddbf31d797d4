//! Store record use-case service.
//!
//! # Responsibility
//! - Provide the store CRUD entry points used by the console.
//! - Acquire one connection per operation and release it on every path.
//! - Log every operation outcome on the operation's own channel.
//!
//! # Invariants
//! - Input validation happens before any connection is acquired.
//! - Not-found outcomes are values (`None`, `0`), except for
//!   `update_restrictions` which reports `RepoError::NotFound`.
//! - `insert_many` attempts every row; one row's failure never aborts the batch.
//! - `delete_many` deletes nothing unless the scope is `All` and the
//!   confirmation callback approves.

use crate::db::ConnectionManager;
use crate::logging::{Channel, LogChannel, LogContext};
use crate::model::store::{Restrictions, StoreId, StoreInput, StoreRecord};
use crate::repo::store_repo::{DocumentStoreRepository, RepoError, RepoResult, StoreRepository};
use log::{error, info, warn};

/// Scope argument of [`StoreService::delete_many`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteScope {
    All,
    /// Any other criteria text; not supported.
    Criteria(String),
}

impl DeleteScope {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Criteria(trimmed.to_string())
        }
    }
}

/// Result of [`StoreService::delete_many`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteManyOutcome {
    Deleted(u64),
    /// Operator declined; nothing was deleted.
    Cancelled { remaining: u64 },
    /// Partial-criteria deletion is not supported; nothing was deleted.
    Unsupported { criteria: String, remaining: u64 },
}

/// One skipped row of a batch insert.
#[derive(Debug)]
pub struct RowFailure {
    /// 1-based position in the input sequence.
    pub row: usize,
    pub error: RepoError,
}

/// Outcome of [`StoreService::insert_many`].
#[derive(Debug, Default)]
pub struct BatchReport {
    pub inserted: Vec<StoreId>,
    pub failures: Vec<RowFailure>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.inserted.len() + self.failures.len()
    }
}

/// Use-case service for store records.
pub struct StoreService {
    connections: ConnectionManager,
    namespace: String,
    insert_one_log: LogChannel,
    insert_many_log: LogChannel,
    search_log: LogChannel,
    search_all_log: LogChannel,
    modify_log: LogChannel,
    delete_log: LogChannel,
}

impl StoreService {
    pub fn new(connections: ConnectionManager, namespace: impl Into<String>, logs: &LogContext) -> Self {
        Self {
            connections,
            namespace: namespace.into(),
            insert_one_log: logs.channel(Channel::InsertOne),
            insert_many_log: logs.channel(Channel::InsertMany),
            search_log: logs.channel(Channel::Search),
            search_all_log: logs.channel(Channel::SearchAll),
            modify_log: logs.channel(Channel::Modify),
            delete_log: logs.channel(Channel::Delete),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Coerces `input` and inserts it as one new record.
    ///
    /// # Errors
    /// - `RepoError::Validation` for malformed input, before any store access.
    /// - `RepoError::Conflict` when the id already exists.
    pub fn insert_one(&self, input: &StoreInput) -> RepoResult<StoreId> {
        let record = match input.to_record() {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    target: self.insert_one_log.target(),
                    "event=store_insert module={} status=error kind=validation error={}",
                    self.insert_one_log.module(),
                    err
                );
                return Err(err.into());
            }
        };
        self.insert_record(&record)
    }

    /// Inserts an already typed record.
    pub fn insert_record(&self, record: &StoreRecord) -> RepoResult<StoreId> {
        let log = self.insert_one_log;
        let result = self.connections.scoped(|conn| {
            DocumentStoreRepository::new(conn, &self.namespace).insert_store(record)
        });
        match &result {
            Ok(id) => info!(
                target: log.target(),
                "event=store_insert module={} status=ok id={}",
                log.module(),
                id
            ),
            Err(err) => log_failure(log, "store_insert", &record.id, err),
        }
        result
    }

    /// Validates and inserts each row independently, in input order, over
    /// one connection.
    ///
    /// # Errors
    /// - Only when the connection itself cannot be acquired; row failures
    ///   are collected into the report.
    pub fn insert_many<I>(&self, rows: I) -> RepoResult<BatchReport>
    where
        I: IntoIterator<Item = StoreInput>,
    {
        let log = self.insert_many_log;
        let result = self.connections.scoped(|conn| -> RepoResult<BatchReport> {
            let repo = DocumentStoreRepository::new(conn, &self.namespace);
            let mut report = BatchReport::default();

            for (index, input) in rows.into_iter().enumerate() {
                let row = index + 1;
                let outcome = input
                    .to_record()
                    .map_err(RepoError::from)
                    .and_then(|record| repo.insert_store(&record));
                match outcome {
                    Ok(id) => {
                        info!(
                            target: log.target(),
                            "event=store_insert_row module={} status=ok row={} id={}",
                            log.module(),
                            row,
                            id
                        );
                        report.inserted.push(id);
                    }
                    Err(err) => {
                        warn!(
                            target: log.target(),
                            "event=store_insert_row module={} status=error row={} error={}",
                            log.module(),
                            row,
                            err
                        );
                        report.failures.push(RowFailure { row, error: err });
                    }
                }
            }
            Ok(report)
        });

        match &result {
            Ok(report) => info!(
                target: log.target(),
                "event=store_insert_many module={} status=ok attempted={} inserted={} skipped={}",
                log.module(),
                report.attempted(),
                report.inserted.len(),
                report.failures.len()
            ),
            Err(err) => error!(
                target: log.target(),
                "event=store_insert_many module={} status=error error={}",
                log.module(),
                err
            ),
        }
        result
    }

    /// Returns the record stored under `id`, or `None`.
    pub fn find_by_id(&self, id: &StoreId) -> RepoResult<Option<StoreRecord>> {
        let log = self.search_log;
        let result = self.connections.scoped(|conn| {
            DocumentStoreRepository::new(conn, &self.namespace).get_store(id)
        });
        match &result {
            Ok(Some(_)) => info!(
                target: log.target(),
                "event=store_find module={} status=ok id={}",
                log.module(),
                id
            ),
            Ok(None) => info!(
                target: log.target(),
                "event=store_find module={} status=ok id={} result=not_found",
                log.module(),
                id
            ),
            Err(err) => log_failure(log, "store_find", id, err),
        }
        result
    }

    /// Returns every record in store order; empty when the collection is.
    pub fn find_all(&self) -> RepoResult<Vec<StoreRecord>> {
        let log = self.search_all_log;
        let result = self.connections.scoped(|conn| {
            DocumentStoreRepository::new(conn, &self.namespace).list_stores()
        });
        match &result {
            Ok(records) if records.is_empty() => info!(
                target: log.target(),
                "event=store_find_all module={} status=ok count=0 result=empty",
                log.module()
            ),
            Ok(records) => info!(
                target: log.target(),
                "event=store_find_all module={} status=ok count={}",
                log.module(),
                records.len()
            ),
            Err(err) => error!(
                target: log.target(),
                "event=store_find_all module={} status=error error={}",
                log.module(),
                err
            ),
        }
        result
    }

    /// Deletes at most one record. Returns 0 when `id` is absent.
    pub fn delete_one(&self, id: &StoreId) -> RepoResult<u64> {
        let log = self.delete_log;
        let result = self.connections.scoped(|conn| {
            DocumentStoreRepository::new(conn, &self.namespace).delete_store(id)
        });
        match &result {
            Ok(0) => info!(
                target: log.target(),
                "event=store_delete module={} status=ok id={} deleted=0 result=not_found",
                log.module(),
                id
            ),
            Ok(deleted) => info!(
                target: log.target(),
                "event=store_delete module={} status=ok id={} deleted={}",
                log.module(),
                id,
                deleted
            ),
            Err(err) => log_failure(log, "store_delete", id, err),
        }
        result
    }

    /// Deletes every record when `scope` is `All` and `confirm` approves.
    ///
    /// `confirm` receives the current record count and runs while the
    /// operation's connection is held.
    pub fn delete_many<F>(&self, scope: &DeleteScope, confirm: F) -> RepoResult<DeleteManyOutcome>
    where
        F: FnOnce(u64) -> bool,
    {
        let log = self.delete_log;
        let result = self.connections.scoped(|conn| -> RepoResult<DeleteManyOutcome> {
            let repo = DocumentStoreRepository::new(conn, &self.namespace);
            let remaining = repo.count_stores()?;
            match scope {
                DeleteScope::Criteria(criteria) => Ok(DeleteManyOutcome::Unsupported {
                    criteria: criteria.clone(),
                    remaining,
                }),
                DeleteScope::All => {
                    if confirm(remaining) {
                        Ok(DeleteManyOutcome::Deleted(repo.delete_all_stores()?))
                    } else {
                        Ok(DeleteManyOutcome::Cancelled { remaining })
                    }
                }
            }
        });

        match &result {
            Ok(DeleteManyOutcome::Deleted(deleted)) => info!(
                target: log.target(),
                "event=store_delete_many module={} status=ok deleted={}",
                log.module(),
                deleted
            ),
            Ok(DeleteManyOutcome::Cancelled { remaining }) => info!(
                target: log.target(),
                "event=store_delete_many module={} status=ok result=cancelled remaining={}",
                log.module(),
                remaining
            ),
            Ok(DeleteManyOutcome::Unsupported {
                criteria,
                remaining,
            }) => warn!(
                target: log.target(),
                "event=store_delete_many module={} status=warn result=unsupported criteria={:?} remaining={}",
                log.module(),
                criteria,
                remaining
            ),
            Err(err) => error!(
                target: log.target(),
                "event=store_delete_many module={} status=error error={}",
                log.module(),
                err
            ),
        }
        result
    }

    /// Sets the restrictions of an existing record, leaving every other
    /// field untouched.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when no record has `id`; nothing is written.
    pub fn update_restrictions(&self, id: &StoreId, restrictions: &Restrictions) -> RepoResult<()> {
        let log = self.modify_log;
        let result = self.connections.scoped(|conn| {
            DocumentStoreRepository::new(conn, &self.namespace).set_restrictions(id, restrictions)
        });
        match &result {
            Ok(()) => info!(
                target: log.target(),
                "event=store_update_restrictions module={} status=ok id={} days={}",
                log.module(),
                id,
                restrictions.len()
            ),
            Err(err) => log_failure(log, "store_update_restrictions", id, err),
        }
        result
    }
}

fn log_failure(log: LogChannel, event: &str, id: &StoreId, err: &RepoError) {
    match err {
        RepoError::Validation(_) | RepoError::Conflict(_) | RepoError::NotFound(_) => warn!(
            target: log.target(),
            "event={} module={} status=error id={} error={}",
            event,
            log.module(),
            id,
            err
        ),
        RepoError::Connectivity(_) | RepoError::Unexpected(_) => error!(
            target: log.target(),
            "event={} module={} status=error id={} error={}",
            event,
            log.module(),
            id,
            err
        ),
    }
}
