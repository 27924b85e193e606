// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::credentials::CredentialError;
use crate::auth::{AuthGate, AuthorizationPolicy, InMemoryCredentials, TokenCodec};
use crate::config::Config;

/// Shared, read-only application state.
#[derive(Clone)]
pub struct AppState {
    pub gate: AuthGate,
}

impl AppState {
    pub fn new(policy: AuthorizationPolicy) -> Self {
        Self {
            gate: AuthGate::new(Arc::new(policy)),
        }
    }

    /// Wire codec, credential store and policy from configuration.
    ///
    /// Bootstrap passwords are hashed here, once.
    pub fn from_config(config: &Config) -> Result<Self, CredentialError> {
        let codec = Arc::new(TokenCodec::new(Arc::clone(&config.key), config.token_ttl));

        let mut credentials = InMemoryCredentials::new()?;
        for user in &config.users {
            credentials = credentials.with_user(&user.username, &user.password, user.role)?;
        }
        if credentials.is_empty() {
            tracing::warn!("No bootstrap users configured, every login will be rejected");
        }

        let policy = config.role_rules.iter().cloned().fold(
            AuthorizationPolicy::new(codec, Arc::new(credentials))
                .with_public_routes(config.public_routes.clone())
                .with_credential_timeout(config.credential_timeout),
            |policy, (pattern, role)| policy.with_role_rule(pattern, role),
        );

        Ok(Self::new(policy))
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        self.gate.policy()
    }
}
