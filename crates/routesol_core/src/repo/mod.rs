//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate document encoding and SQL details from services.
//!
//! # Invariants
//! - Repository writes must enforce `StoreRecord::validate()` before persistence.
//! - Absence is an explicit `None`/count of zero, never an error, except for
//!   updates which report `NotFound`.

pub mod store_repo;
pub mod user_repo;
