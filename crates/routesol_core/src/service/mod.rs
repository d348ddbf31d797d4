//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own the per-operation connection lifecycle and operation logging.
//! - Keep the console decoupled from storage details.

pub mod credential_service;
pub mod store_service;
