// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and the authenticated principal.
//!
//! Every service sharing the signing secret reads and writes claims through
//! [`ClaimsSet`], so claim names are spelled exactly once, in [`keys`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::roles::Role;

/// Canonical claim keys of the token payload.
///
/// The serde attributes on [`ClaimsSet`] must agree with these; the tests
/// below hold them together.
pub mod keys {
    /// Canonical username.
    pub const SUBJECT: &str = "sub";
    /// Stable external user identifier. Camel case; `userid` is not accepted.
    pub const USER_ID: &str = "userId";
    /// Optional copy of the subject for readers that expect it.
    pub const USERNAME: &str = "username";
    /// Issued at, seconds since the Unix epoch.
    pub const ISSUED_AT: &str = "iat";
    /// Expiration, seconds since the Unix epoch.
    pub const EXPIRES_AT: &str = "exp";
    /// Optional role name.
    pub const ROLE: &str = "role";
}

/// A claim set could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClaimsError {
    /// `sub` or `userId` is empty.
    #[error("claim `{0}` must not be empty")]
    EmptyClaim(&'static str),
    /// Lifetime rounds down to zero seconds or overflows the timestamp.
    #[error("token lifetime must be between one second and the end of time")]
    InvalidLifetime,
}

/// Identity payload embedded in a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsSet {
    /// Canonical username, the single source of truth for identity.
    #[serde(rename = "sub")]
    pub subject: String,

    /// External user identifier (UUID string in this platform).
    #[serde(rename = "userId")]
    pub user_id: String,

    /// Copy of `subject`. Must match it when present.
    #[serde(rename = "username", default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Issued at timestamp
    #[serde(rename = "iat")]
    pub issued_at: i64,

    /// Expiration timestamp
    #[serde(rename = "exp")]
    pub expires_at: i64,

    /// Role name, if any
    #[serde(rename = "role", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ClaimsSet {
    /// Build a claim set issued at `issued_at` (epoch seconds) and valid for `ttl`.
    ///
    /// Sub-second precision is dropped, so `ttl` must be at least one second.
    pub fn new(
        subject: impl Into<String>,
        user_id: impl Into<String>,
        issued_at: i64,
        ttl: Duration,
    ) -> Result<Self, ClaimsError> {
        let subject = subject.into();
        let user_id = user_id.into();
        if subject.is_empty() {
            return Err(ClaimsError::EmptyClaim(keys::SUBJECT));
        }
        if user_id.is_empty() {
            return Err(ClaimsError::EmptyClaim(keys::USER_ID));
        }

        let expires_at = i64::try_from(ttl.as_secs())
            .ok()
            .filter(|secs| *secs > 0)
            .and_then(|secs| issued_at.checked_add(secs))
            .ok_or(ClaimsError::InvalidLifetime)?;

        Ok(Self {
            username: Some(subject.clone()),
            subject,
            user_id,
            issued_at,
            expires_at,
            role: None,
        })
    }

    /// Attach a role claim.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role.as_str().to_string());
        self
    }

    /// Canonical username.
    pub fn username(&self) -> &str {
        &self.subject
    }

    /// A token is valid only while `now < exp`; `exp == now` is expired.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// Structural invariants a decoded claim set must satisfy.
    pub(crate) fn is_consistent(&self) -> bool {
        !self.subject.is_empty()
            && !self.user_id.is_empty()
            && self
                .username
                .as_deref()
                .map_or(true, |copy| copy == self.subject)
    }
}

/// Authenticated identity attached to a request.
///
/// Only obtainable from a verified [`ClaimsSet`]; there is no public
/// constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    username: String,
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
}

impl Principal {
    /// Derive from claims that have already passed verification.
    pub(crate) fn from_claims(claims: ClaimsSet) -> Self {
        let role = claims.role.as_deref().and_then(|r| {
            let parsed = Role::parse(r);
            if parsed.is_none() {
                tracing::debug!(role = %r, "Ignoring unknown role claim");
            }
            parsed
        });

        Self {
            username: claims.subject,
            user_id: claims.user_id,
            role,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Check if the principal has the required role.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.is_some_and(|role| role.has_privilege(required))
    }

    /// Check if this principal is an admin.
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}
