//! Credential registration and login.
//!
//! # Responsibility
//! - Register users with salted Argon2id password hashes.
//! - Verify login attempts against stored hashes.
//! - Bound login attempts per session through [`LoginGate`].
//!
//! # Invariants
//! - Raw passwords are never persisted or logged.
//! - Every registration uses a fresh random salt.
//! - Password mismatch and blank usernames fail before any store access.
//! - Unknown users and wrong passwords produce the same `Ok(false)`.

use crate::db::{ConnectionManager, DbError};
use crate::logging::{Channel, LogChannel, LogContext};
use crate::model::user::{Password, UserCredential, UserId};
use crate::repo::user_repo::{CredentialRepository, DocumentCredentialRepository};
use argon2::Argon2;
use log::{error, info, warn};
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Login attempts allowed per session.
pub const MAX_LOGIN_ATTEMPTS: u32 = 3;

pub type CredentialResult<T> = Result<T, CredentialError>;

#[derive(Debug)]
pub enum CredentialError {
    /// Password and confirmation differ.
    Mismatch,
    DuplicateUser(String),
    Validation(String),
    Connectivity(DbError),
    Unexpected(String),
}

impl Display for CredentialError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mismatch => write!(f, "passwords do not match"),
            Self::DuplicateUser(username) => write!(f, "username `{username}` already exists"),
            Self::Validation(message) => write!(f, "validation failed: {message}"),
            Self::Connectivity(err) => write!(f, "connectivity failure: {err}"),
            Self::Unexpected(message) => write!(f, "unexpected credential failure: {message}"),
        }
    }
}

impl Error for CredentialError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connectivity(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for CredentialError {
    fn from(value: DbError) -> Self {
        if value.is_connectivity() {
            Self::Connectivity(value)
        } else {
            Self::Unexpected(value.to_string())
        }
    }
}

/// Use-case service for user credentials.
pub struct CredentialService {
    connections: ConnectionManager,
    namespace: String,
    registration_log: LogChannel,
    login_log: LogChannel,
}

impl CredentialService {
    pub fn new(connections: ConnectionManager, namespace: impl Into<String>, logs: &LogContext) -> Self {
        Self {
            connections,
            namespace: namespace.into(),
            registration_log: logs.channel(Channel::Registration),
            login_log: logs.channel(Channel::Login),
        }
    }

    /// Registers `username` and returns the new credential id.
    ///
    /// # Errors
    /// - `Validation` for a blank username, `Mismatch` when the passwords
    ///   differ; neither touches the store.
    /// - `DuplicateUser` when the username is taken, including when a
    ///   concurrent registration wins between lookup and insert.
    pub fn register(
        &self,
        username: &str,
        password: &Password,
        confirm_password: &Password,
    ) -> CredentialResult<UserId> {
        let log = self.registration_log;
        let username = username.trim();
        let result = self.register_checked(username, password, confirm_password);
        match &result {
            Ok(id) => info!(
                target: log.target(),
                "event=user_register module={} status=ok username={} id={}",
                log.module(),
                username,
                id
            ),
            Err(err @ (CredentialError::Connectivity(_) | CredentialError::Unexpected(_))) => {
                error!(
                    target: log.target(),
                    "event=user_register module={} status=error username={} error={}",
                    log.module(),
                    username,
                    err
                )
            }
            Err(err) => warn!(
                target: log.target(),
                "event=user_register module={} status=error username={} error={}",
                log.module(),
                username,
                err
            ),
        }
        result
    }

    fn register_checked(
        &self,
        username: &str,
        password: &Password,
        confirm_password: &Password,
    ) -> CredentialResult<UserId> {
        if username.is_empty() {
            return Err(CredentialError::Validation(
                "username must not be blank".to_string(),
            ));
        }
        if password != confirm_password {
            return Err(CredentialError::Mismatch);
        }

        self.connections.scoped(|conn| -> CredentialResult<UserId> {
            let repo = DocumentCredentialRepository::new(conn, &self.namespace);
            if repo.find_by_username(username)?.is_some() {
                return Err(CredentialError::DuplicateUser(username.to_string()));
            }

            let credential = UserCredential {
                id: Uuid::new_v4(),
                username: username.to_string(),
                password_hash: hash_password(password)?,
            };
            match repo.insert_credential(&credential) {
                Ok(id) => Ok(id),
                Err(err) if err.is_unique_violation() => {
                    Err(CredentialError::DuplicateUser(username.to_string()))
                }
                Err(err) => Err(err.into()),
            }
        })
    }

    /// Checks `password` for `username`.
    ///
    /// Returns `Ok(false)` both for unknown users and wrong passwords.
    pub fn login(&self, username: &str, password: &Password) -> CredentialResult<bool> {
        let log = self.login_log;
        let username = username.trim();
        let result = self.connections.scoped(|conn| -> CredentialResult<LoginCheck> {
            let repo = DocumentCredentialRepository::new(conn, &self.namespace);
            match repo.find_by_username(username)? {
                None => Ok(LoginCheck::UnknownUser),
                Some(credential) => {
                    if verify_password(password, &credential.password_hash)? {
                        Ok(LoginCheck::Granted)
                    } else {
                        Ok(LoginCheck::WrongPassword)
                    }
                }
            }
        });

        match result {
            Ok(LoginCheck::Granted) => {
                info!(
                    target: log.target(),
                    "event=user_login module={} status=ok username={}",
                    log.module(),
                    username
                );
                Ok(true)
            }
            Ok(check) => {
                warn!(
                    target: log.target(),
                    "event=user_login module={} status=denied username={} reason={}",
                    log.module(),
                    username,
                    check.reason()
                );
                Ok(false)
            }
            Err(err) => {
                error!(
                    target: log.target(),
                    "event=user_login module={} status=error username={} error={}",
                    log.module(),
                    username,
                    err
                );
                Err(err)
            }
        }
    }
}

enum LoginCheck {
    Granted,
    UnknownUser,
    WrongPassword,
}

impl LoginCheck {
    fn reason(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::UnknownUser => "username_not_found",
            Self::WrongPassword => "password_mismatch",
        }
    }
}

fn hash_password(password: &Password) -> CredentialResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.expose().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| CredentialError::Unexpected(format!("password hashing failed: {err}")))
}

fn verify_password(password: &Password, stored_hash: &str) -> CredentialResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|err| CredentialError::Unexpected(format!("stored hash is invalid: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.expose().as_bytes(), &parsed)
        .is_ok())
}

/// Result of recording one login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Granted,
    Denied { remaining: u32 },
    Locked,
}

/// Per-session login attempt counter.
#[derive(Debug, Clone)]
pub struct LoginGate {
    failures: u32,
    max_attempts: u32,
    granted: bool,
}

impl Default for LoginGate {
    fn default() -> Self {
        Self::new(MAX_LOGIN_ATTEMPTS)
    }
}

impl LoginGate {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            failures: 0,
            max_attempts,
            granted: false,
        }
    }

    /// Whether another attempt may be made.
    pub fn allows_attempt(&self) -> bool {
        !self.granted && self.failures < self.max_attempts
    }

    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.failures)
    }

    /// Records the outcome of one attempt.
    ///
    /// Attempts after lockout are refused without being counted.
    pub fn record(&mut self, granted: bool) -> LoginStatus {
        if self.failures >= self.max_attempts {
            return LoginStatus::Locked;
        }
        if granted {
            self.granted = true;
            return LoginStatus::Granted;
        }
        self.failures += 1;
        if self.failures >= self.max_attempts {
            LoginStatus::Locked
        } else {
            LoginStatus::Denied {
                remaining: self.remaining(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{hash_password, verify_password, LoginGate, LoginStatus};
    use crate::model::user::Password;

    #[test]
    fn hashes_use_fresh_salts_and_verify() {
        let password = Password::new("s3cret");
        let first = hash_password(&password).unwrap();
        let second = hash_password(&password).unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_password(&password, &first).unwrap());
        assert!(!verify_password(&Password::new("other"), &first).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_unexpected() {
        assert!(verify_password(&Password::new("x"), "not-a-hash").is_err());
    }

    #[test]
    fn gate_locks_after_three_failures() {
        let mut gate = LoginGate::default();
        assert_eq!(gate.record(false), LoginStatus::Denied { remaining: 2 });
        assert_eq!(gate.record(false), LoginStatus::Denied { remaining: 1 });
        assert_eq!(gate.record(false), LoginStatus::Locked);
        assert!(!gate.allows_attempt());
        assert_eq!(gate.record(true), LoginStatus::Locked);
    }

    #[test]
    fn gate_grants_within_limit() {
        let mut gate = LoginGate::default();
        assert_eq!(gate.record(false), LoginStatus::Denied { remaining: 2 });
        assert_eq!(gate.record(true), LoginStatus::Granted);
        assert!(!gate.allows_attempt());
    }
}
