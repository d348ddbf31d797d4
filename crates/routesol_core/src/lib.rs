//! Core domain logic for Route Stores.
//! This crate is the single source of truth for store and credential invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{ConnectionManager, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, Channel, LogChannel, LogContext};
pub use model::grouping::{LoadCombination, TemperatureBand, TrailerZone, WarehouseArea};
pub use model::store::{
    Restrictions, StoreId, StoreInput, StoreRecord, StoreValidationError, Weekday,
};
pub use model::user::{Password, UserCredential, UserId};
pub use repo::store_repo::{
    DocumentStoreRepository, RepoError, RepoResult, StoreRepository, STORES_COLLECTION,
};
pub use repo::user_repo::{CredentialRepository, DocumentCredentialRepository, USERS_COLLECTION};
pub use service::credential_service::{
    CredentialError, CredentialResult, CredentialService, LoginGate, LoginStatus,
    MAX_LOGIN_ATTEMPTS,
};
pub use service::store_service::{
    BatchReport, DeleteManyOutcome, DeleteScope, RowFailure, StoreService,
};

/// Default namespace of the `Stores` collection.
pub const DEFAULT_STORES_NAMESPACE: &str = "StoreInformation";
/// Default namespace of the `Users` collection.
pub const DEFAULT_USERS_NAMESPACE: &str = "UserInformation";

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
