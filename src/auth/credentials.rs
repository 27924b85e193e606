// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential verification for the login path.
//!
//! Password storage belongs to the user service. The gate only needs a
//! [`CredentialVerifier`] that answers "who is this, if anyone". The
//! in-memory implementation here backs bootstrap accounts configured through
//! `AUTH_USERS`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use thiserror::Error;
use uuid::Uuid;

use super::roles::Role;

/// Boxed future returned by [`CredentialVerifier::verify`].
pub type VerifyFuture<'a> =
    Pin<Box<dyn Future<Output = Result<VerifiedUser, CredentialError>> + Send + 'a>>;

/// Identity confirmed by a credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: Option<Role>,
}

/// Credential check failure.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Unknown user or wrong password. Deliberately not split.
    #[error("credentials rejected")]
    Rejected,
    /// The backing store failed.
    #[error("credential backend failure: {0}")]
    Backend(String),
}

/// Opaque password-checking collaborator.
pub trait CredentialVerifier: Send + Sync {
    fn verify<'a>(&'a self, username: &'a str, password: &'a str) -> VerifyFuture<'a>;
}

#[derive(Clone)]
struct StoredUser {
    user_id: Uuid,
    role: Option<Role>,
    hash: String,
}

/// In-memory Argon2 credential store.
#[derive(Clone)]
pub struct InMemoryCredentials {
    users: Arc<HashMap<String, StoredUser>>,
    dummy_hash: Arc<String>,
}

impl InMemoryCredentials {
    /// Build an empty store.
    pub fn new() -> Result<Self, CredentialError> {
        Ok(Self {
            users: Arc::new(HashMap::new()),
            dummy_hash: Arc::new(hash("not-a-real-password")?),
        })
    }

    /// Add a user with a fresh user id, hashing the password.
    pub fn with_user(
        mut self,
        username: &str,
        password: &str,
        role: Option<Role>,
    ) -> Result<Self, CredentialError> {
        let stored = StoredUser {
            user_id: Uuid::new_v4(),
            role,
            hash: hash(password)?,
        };
        Arc::make_mut(&mut self.users).insert(username.to_string(), stored);
        Ok(self)
    }

    /// Number of configured users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialVerifier for InMemoryCredentials {
    fn verify<'a>(&'a self, username: &'a str, password: &'a str) -> VerifyFuture<'a> {
        let users = Arc::clone(&self.users);
        let dummy_hash = Arc::clone(&self.dummy_hash);
        let username = username.to_string();
        let password = password.to_string();

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                match users.get(&username) {
                    Some(user) if check(&password, &user.hash) => Ok(VerifiedUser {
                        user_id: user.user_id,
                        username,
                        role: user.role,
                    }),
                    Some(_) => Err(CredentialError::Rejected),
                    None => {
                        // Same hashing cost as a real account.
                        let _ = check(&password, &dummy_hash);
                        Err(CredentialError::Rejected)
                    }
                }
            })
            .await
            .map_err(|e| CredentialError::Backend(e.to_string()))?
        })
    }
}

fn salt() -> Result<SaltString, CredentialError> {
    use rand::Rng;
    let bytes = &mut [0u8; 16];
    rand::rng().fill(bytes);
    SaltString::encode_b64(bytes).map_err(|e| CredentialError::Backend(e.to_string()))
}

/// Hash a password with Argon2 defaults.
pub fn hash(password: &str) -> Result<String, CredentialError> {
    Argon2::default()
        .hash_password(password.as_bytes(), &salt()?)
        .map(|h| h.to_string())
        .map_err(|e| CredentialError::Backend(e.to_string()))
}

/// Check a password against a PHC hash string.
pub fn check(password: &str, hashword: &str) -> bool {
    PasswordHash::new(hashword)
        .ok()
        .as_ref()
        .map(|hash| {
            Argon2::default()
                .verify_password(password.as_bytes(), hash)
                .is_ok()
        })
        .unwrap_or(false)
}
