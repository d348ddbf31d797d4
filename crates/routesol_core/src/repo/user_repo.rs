//! Credential persistence over the `Users` collection.
//!
//! # Invariants
//! - At most one document per username; the unique index is the final guard.
//! - Documents carry the PHC hash only.

use crate::db::{Collection, DbError, DbResult, DocKey};
use crate::model::user::{UserCredential, UserId};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const USERS_COLLECTION: &str = "Users";
const USERNAME_FIELD: &str = "username";

/// Repository interface for credential records.
pub trait CredentialRepository {
    fn find_by_username(&self, username: &str) -> DbResult<Option<UserCredential>>;
    fn insert_credential(&self, credential: &UserCredential) -> DbResult<UserId>;
}

/// Credential repository backed by a JSON document collection.
pub struct DocumentCredentialRepository<'conn> {
    collection: Collection<'conn>,
}

impl<'conn> DocumentCredentialRepository<'conn> {
    pub fn new(conn: &'conn Connection, namespace: &str) -> Self {
        Self {
            collection: Collection::new(conn, namespace, USERS_COLLECTION),
        }
    }
}

impl CredentialRepository for DocumentCredentialRepository<'_> {
    fn find_by_username(&self, username: &str) -> DbResult<Option<UserCredential>> {
        self.collection
            .find_one_by_field(USERNAME_FIELD, username)?
            .map(|(key, body)| decode_credential(key, body))
            .transpose()
    }

    fn insert_credential(&self, credential: &UserCredential) -> DbResult<UserId> {
        let body = serde_json::to_value(UserDocument {
            username: credential.username.clone(),
            password_hash: credential.password_hash.clone(),
        })
        .map_err(|err| DbError::InvalidDocument(err.to_string()))?;
        self.collection
            .insert_one(&DocKey::Text(credential.id.to_string()), &body)?;
        Ok(credential.id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    username: String,
    password_hash: String,
}

fn decode_credential(key: DocKey, body: Value) -> DbResult<UserCredential> {
    let id = match &key {
        DocKey::Text(text) => Uuid::parse_str(text)
            .map_err(|err| DbError::InvalidDocument(format!("invalid user id `{text}`: {err}")))?,
        DocKey::Int(value) => {
            return Err(DbError::InvalidDocument(format!(
                "user id `{value}` is not a uuid"
            )));
        }
    };
    let document: UserDocument = serde_json::from_value(body)
        .map_err(|err| DbError::InvalidDocument(format!("invalid user `{key}`: {err}")))?;
    Ok(UserCredential {
        id,
        username: document.username,
        password_hash: document.password_hash,
    })
}
