//! Store repository contracts and document-store implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over the `Stores` collection.
//! - Map typed store records to JSON documents and back.
//! - Classify storage failures into connectivity, conflict and unexpected.
//!
//! # Invariants
//! - Write paths must call `StoreRecord::validate()` before touching storage.
//! - The record id is the document key; it is not duplicated in the body.
//! - Read paths reject undecodable documents instead of masking them.

use crate::db::{Collection, DbError, DocKey};
use crate::model::store::{Restrictions, StoreId, StoreRecord, StoreValidationError};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const STORES_COLLECTION: &str = "Stores";
const RESTRICTIONS_FIELD: &str = "restrictions";

pub type RepoResult<T> = Result<T, RepoError>;

/// Store repository error.
#[derive(Debug)]
pub enum RepoError {
    /// Store unreachable or unusable.
    Connectivity(DbError),
    Validation(StoreValidationError),
    /// A record with this id already exists.
    Conflict(StoreId),
    NotFound(StoreId),
    Unexpected(String),
}

impl RepoError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connectivity(err) => write!(f, "connectivity failure: {err}"),
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::Conflict(id) => write!(f, "store `{id}` already exists"),
            Self::NotFound(id) => write!(f, "store `{id}` not found"),
            Self::Unexpected(message) => write!(f, "unexpected store failure: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connectivity(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Conflict(_) | Self::NotFound(_) | Self::Unexpected(_) => None,
        }
    }
}

impl From<StoreValidationError> for RepoError {
    fn from(value: StoreValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        if value.is_connectivity() {
            Self::Connectivity(value)
        } else {
            Self::Unexpected(value.to_string())
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}

/// Repository interface for store records.
pub trait StoreRepository {
    fn insert_store(&self, record: &StoreRecord) -> RepoResult<StoreId>;
    fn get_store(&self, id: &StoreId) -> RepoResult<Option<StoreRecord>>;
    fn list_stores(&self) -> RepoResult<Vec<StoreRecord>>;
    fn delete_store(&self, id: &StoreId) -> RepoResult<u64>;
    fn delete_all_stores(&self) -> RepoResult<u64>;
    fn count_stores(&self) -> RepoResult<u64>;
    /// Replaces only the restrictions field of an existing record.
    fn set_restrictions(&self, id: &StoreId, restrictions: &Restrictions) -> RepoResult<()>;
}

/// Store repository backed by a JSON document collection.
pub struct DocumentStoreRepository<'conn> {
    collection: Collection<'conn>,
}

impl<'conn> DocumentStoreRepository<'conn> {
    pub fn new(conn: &'conn Connection, namespace: &str) -> Self {
        Self {
            collection: Collection::new(conn, namespace, STORES_COLLECTION),
        }
    }
}

impl StoreRepository for DocumentStoreRepository<'_> {
    fn insert_store(&self, record: &StoreRecord) -> RepoResult<StoreId> {
        record.validate()?;

        let body = serde_json::to_value(StoreDocument::from(record))
            .map_err(|err| RepoError::Unexpected(format!("cannot encode store: {err}")))?;
        match self.collection.insert_one(&doc_key(&record.id), &body) {
            Ok(()) => Ok(record.id.clone()),
            Err(err) if err.is_unique_violation() => Err(RepoError::Conflict(record.id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    fn get_store(&self, id: &StoreId) -> RepoResult<Option<StoreRecord>> {
        self.collection
            .find_one(&doc_key(id))?
            .map(|body| decode_store(id.clone(), body))
            .transpose()
    }

    fn list_stores(&self) -> RepoResult<Vec<StoreRecord>> {
        self.collection
            .find()?
            .into_iter()
            .map(|(key, body)| decode_store(store_id(key), body))
            .collect()
    }

    fn delete_store(&self, id: &StoreId) -> RepoResult<u64> {
        Ok(self.collection.delete_one(&doc_key(id))? as u64)
    }

    fn delete_all_stores(&self) -> RepoResult<u64> {
        Ok(self.collection.delete_many()? as u64)
    }

    fn count_stores(&self) -> RepoResult<u64> {
        Ok(self.collection.count()?)
    }

    fn set_restrictions(&self, id: &StoreId, restrictions: &Restrictions) -> RepoResult<()> {
        let key = doc_key(id);
        if self.collection.find_one(&key)?.is_none() {
            return Err(RepoError::NotFound(id.clone()));
        }

        let value = serde_json::to_value(restrictions)
            .map_err(|err| RepoError::Unexpected(format!("cannot encode restrictions: {err}")))?;
        let matched = self.collection.set_field(&key, RESTRICTIONS_FIELD, &value)?;
        if matched == 0 {
            return Err(RepoError::NotFound(id.clone()));
        }

        Ok(())
    }
}

/// Persisted body of a store document.
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    name: String,
    address: String,
    postcode: String,
    distance_km: f64,
    requires_tail_lift: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    restrictions: Option<Restrictions>,
}

impl From<&StoreRecord> for StoreDocument {
    fn from(record: &StoreRecord) -> Self {
        Self {
            name: record.name.clone(),
            address: record.address.clone(),
            postcode: record.postcode.clone(),
            distance_km: record.distance_km,
            requires_tail_lift: record.requires_tail_lift,
            restrictions: record.restrictions.clone(),
        }
    }
}

fn decode_store(id: StoreId, body: Value) -> RepoResult<StoreRecord> {
    let document: StoreDocument = serde_json::from_value(body)
        .map_err(|err| RepoError::Unexpected(format!("invalid stored store `{id}`: {err}")))?;
    Ok(StoreRecord {
        id,
        name: document.name,
        address: document.address,
        postcode: document.postcode,
        distance_km: document.distance_km,
        requires_tail_lift: document.requires_tail_lift,
        restrictions: document.restrictions,
    })
}

fn doc_key(id: &StoreId) -> DocKey {
    match id {
        StoreId::Int(value) => DocKey::Int(*value),
        StoreId::Native(value) => DocKey::Text(value.clone()),
    }
}

fn store_id(key: DocKey) -> StoreId {
    match key {
        DocKey::Int(value) => StoreId::Int(value),
        DocKey::Text(value) => StoreId::Native(value),
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentStoreRepository, RepoError, StoreRepository};
    use crate::db::open_db_in_memory;
    use crate::model::store::{StoreId, StoreRecord};

    #[test]
    fn int_and_native_ids_address_different_records() {
        let conn = open_db_in_memory().unwrap();
        let repo = DocumentStoreRepository::new(&conn, "StoreInformation");

        let int_store = StoreRecord::new(StoreId::Int(1), "Int", "1 Road", "AA1", 1.0, false);
        let native_store = StoreRecord::new(
            StoreId::Native("one".to_string()),
            "Native",
            "2 Road",
            "BB2",
            2.0,
            true,
        );
        repo.insert_store(&int_store).unwrap();
        repo.insert_store(&native_store).unwrap();

        assert_eq!(repo.get_store(&StoreId::Int(1)).unwrap(), Some(int_store));
        assert_eq!(
            repo.get_store(&StoreId::Native("1".to_string())).unwrap(),
            None
        );
        assert_eq!(repo.list_stores().unwrap().len(), 2);
    }

    #[test]
    fn invalid_record_is_rejected_before_write() {
        let conn = open_db_in_memory().unwrap();
        let repo = DocumentStoreRepository::new(&conn, "StoreInformation");

        let record = StoreRecord::new(StoreId::Int(5), " ", "1 Road", "AA1", 1.0, false);
        let err = repo.insert_store(&record).unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
        assert_eq!(repo.count_stores().unwrap(), 0);
    }
}
