//! Domain model for stores, credentials and cargo grouping.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Resolve loosely typed operator/import input into typed records once.
//!
//! # Invariants
//! - Every store is identified by a `StoreId` resolved at the input boundary.
//! - Credential records carry hashes only.

pub mod grouping;
pub mod store;
pub mod user;
