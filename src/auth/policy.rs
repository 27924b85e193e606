// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Static authorization policy consulted by the gate.
//!
//! ## Route Patterns
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `/api/v1/auth/login` | exactly that path |
//! | `/health/**` | `/health` and everything below it |
//!
//! Prefix rules respect segment boundaries: `/health/**` does not match
//! `/healthcheck`.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::claims::Principal;
use super::codec::{IssuedToken, TokenCodec};
use super::credentials::{CredentialError, CredentialVerifier};
use super::error::AuthError;
use super::roles::Role;

/// Routes reachable without a token unless configured otherwise.
pub const DEFAULT_PUBLIC_ROUTES: &[&str] =
    &["/api/v1/auth/login", "/api/v1/auth/register", "/health/**"];

/// Default upper bound on one credential check.
pub const DEFAULT_CREDENTIAL_TIMEOUT: Duration = Duration::from_secs(2);

/// A route pattern could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("route pattern must start with '/': {0:?}")]
    NotAbsolute(String),
    #[error("wildcards are only supported as a trailing '/**': {0:?}")]
    UnsupportedWildcard(String),
}

/// Exact path or segment-aware prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    Exact(String),
    Prefix(String),
}

impl RoutePattern {
    /// Parse `"/exact"` or `"/prefix/**"`.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let pattern = pattern.trim();
        if !pattern.starts_with('/') {
            return Err(PatternError::NotAbsolute(pattern.to_string()));
        }
        if let Some(prefix) = pattern.strip_suffix("/**") {
            if prefix.contains('*') {
                return Err(PatternError::UnsupportedWildcard(pattern.to_string()));
            }
            return Ok(RoutePattern::Prefix(prefix.to_string()));
        }
        if pattern.contains('*') {
            return Err(PatternError::UnsupportedWildcard(pattern.to_string()));
        }
        Ok(RoutePattern::Exact(pattern.to_string()))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            RoutePattern::Exact(exact) => path == exact,
            // `/**` at the root covers everything.
            RoutePattern::Prefix(prefix) if prefix.is_empty() => true,
            RoutePattern::Prefix(prefix) => path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct IssuedLogin {
    pub principal: Principal,
    pub issued: IssuedToken,
}

/// Public routes, role rules and the login path.
#[derive(Clone)]
pub struct AuthorizationPolicy {
    public_routes: Vec<RoutePattern>,
    role_rules: Vec<(RoutePattern, Role)>,
    allow_preflight: bool,
    codec: Arc<TokenCodec>,
    verifier: Arc<dyn CredentialVerifier>,
    credential_timeout: Duration,
}

impl AuthorizationPolicy {
    /// Policy with the default public routes, preflight bypass enabled and
    /// no role rules.
    pub fn new(codec: Arc<TokenCodec>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        let public_routes = DEFAULT_PUBLIC_ROUTES
            .iter()
            .filter_map(|p| RoutePattern::parse(p).ok())
            .collect();
        Self {
            public_routes,
            role_rules: Vec::new(),
            allow_preflight: true,
            codec,
            verifier,
            credential_timeout: DEFAULT_CREDENTIAL_TIMEOUT,
        }
    }

    /// Replace the public route list.
    pub fn with_public_routes(mut self, routes: Vec<RoutePattern>) -> Self {
        self.public_routes = routes;
        self
    }

    /// Require `role` on every path matching `pattern`. First match wins.
    pub fn with_role_rule(mut self, pattern: RoutePattern, role: Role) -> Self {
        self.role_rules.push((pattern, role));
        self
    }

    /// Whether `OPTIONS` requests bypass authentication.
    pub fn with_preflight_bypass(mut self, allow: bool) -> Self {
        self.allow_preflight = allow;
        self
    }

    /// Bound on one call into the credential verifier.
    pub fn with_credential_timeout(mut self, timeout: Duration) -> Self {
        self.credential_timeout = timeout;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Paths reachable without a token.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_routes.iter().any(|route| route.matches(path))
    }

    pub fn allows_preflight(&self) -> bool {
        self.allow_preflight
    }

    /// Role required for `path`, if any rule matches.
    pub fn required_role(&self, path: &str) -> Option<Role> {
        self.role_rules
            .iter()
            .find(|(pattern, _)| pattern.matches(path))
            .map(|(_, role)| *role)
    }

    /// Role hook. A principal without a role satisfies no requirement.
    pub fn authorize(&self, principal: &Principal, required: Role) -> bool {
        principal.has_role(required)
    }

    /// Check a username/password pair and mint a token for it.
    ///
    /// Every failure of the verifier, including a timeout, is reported as
    /// [`AuthError::InvalidCredentials`].
    pub async fn verify_credentials(
        &self,
        username: &str,
        raw_password: &str,
    ) -> Result<IssuedLogin, AuthError> {
        let outcome = tokio::time::timeout(
            self.credential_timeout,
            self.verifier.verify(username, raw_password),
        )
        .await;

        let user = match outcome {
            Ok(Ok(user)) => user,
            Ok(Err(CredentialError::Rejected)) => {
                tracing::info!(target: "audit", username, "Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
            Ok(Err(CredentialError::Backend(error))) => {
                tracing::error!(username, %error, "Credential verifier failed");
                return Err(AuthError::InvalidCredentials);
            }
            Err(_) => {
                tracing::warn!(
                    username,
                    timeout_ms = self.credential_timeout.as_millis() as u64,
                    "Credential verifier timed out"
                );
                return Err(AuthError::InvalidCredentials);
            }
        };

        let issued = self
            .codec
            .issue(&user.username, &user.user_id.to_string(), user.role)?;
        let principal = Principal::from_claims(issued.claims.clone());

        tracing::info!(
            target: "audit",
            username = %principal.username(),
            user_id = %principal.user_id(),
            "Token issued"
        );

        Ok(IssuedLogin { principal, issued })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::{InMemoryCredentials, VerifiedUser, VerifyFuture};
    use crate::auth::key::KeyMaterial;

    const SECRET: &str = "abcdefghijklmnopqrstuvwxyzABCDEF";

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(
            Arc::new(KeyMaterial::load(SECRET).unwrap()),
            Duration::from_secs(60),
        ))
    }

    fn policy_with(verifier: Arc<dyn CredentialVerifier>) -> AuthorizationPolicy {
        AuthorizationPolicy::new(codec(), verifier)
    }

    fn policy() -> AuthorizationPolicy {
        let store = InMemoryCredentials::new()
            .unwrap()
            .with_user("alice", "wonderland", Some(Role::User))
            .unwrap();
        policy_with(Arc::new(store))
    }

    /// Never answers within any reasonable timeout.
    struct Stalled;

    impl CredentialVerifier for Stalled {
        fn verify<'a>(&'a self, _username: &'a str, _password: &'a str) -> VerifyFuture<'a> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(CredentialError::Rejected)
            })
        }
    }

    struct Broken;

    impl CredentialVerifier for Broken {
        fn verify<'a>(&'a self, _username: &'a str, _password: &'a str) -> VerifyFuture<'a> {
            Box::pin(async { Err(CredentialError::Backend("database down".to_string())) })
        }
    }

    struct Fixed(VerifiedUser);

    impl CredentialVerifier for Fixed {
        fn verify<'a>(&'a self, _username: &'a str, _password: &'a str) -> VerifyFuture<'a> {
            let user = self.0.clone();
            Box::pin(async move { Ok(user) })
        }
    }

    #[test]
    fn pattern_parsing() {
        assert_eq!(
            RoutePattern::parse("/api/v1/auth/login").unwrap(),
            RoutePattern::Exact("/api/v1/auth/login".to_string())
        );
        assert_eq!(
            RoutePattern::parse(" /docs/** ").unwrap(),
            RoutePattern::Prefix("/docs".to_string())
        );
        assert!(matches!(
            RoutePattern::parse("api/v1"),
            Err(PatternError::NotAbsolute(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/api/*/x"),
            Err(PatternError::UnsupportedWildcard(_))
        ));
    }

    #[test]
    fn prefix_respects_segment_boundaries() {
        let health = RoutePattern::parse("/health/**").unwrap();
        assert!(health.matches("/health"));
        assert!(health.matches("/health/live"));
        assert!(!health.matches("/healthcheck"));

        let everything = RoutePattern::parse("/**").unwrap();
        assert!(everything.matches("/anything/at/all"));
    }

    #[test]
    fn default_public_routes() {
        let policy = policy();
        assert!(policy.is_public("/api/v1/auth/login"));
        assert!(policy.is_public("/api/v1/auth/register"));
        assert!(policy.is_public("/health/ready"));
        assert!(!policy.is_public("/api/v1/auth/login/extra"));
        assert!(!policy.is_public("/api/v1/secure"));
        assert!(!policy.is_public("/api/v1/auth/me"));
    }

    #[test]
    fn role_rules_first_match_wins() {
        let policy = policy()
            .with_role_rule(RoutePattern::parse("/api/v1/admin/**").unwrap(), Role::Admin)
            .with_role_rule(RoutePattern::parse("/api/v1/**").unwrap(), Role::User);
        assert_eq!(policy.required_role("/api/v1/admin/users"), Some(Role::Admin));
        assert_eq!(policy.required_role("/api/v1/plans"), Some(Role::User));
        assert_eq!(policy.required_role("/health"), None);
    }

    #[tokio::test]
    async fn valid_credentials_mint_a_verifiable_token() {
        let policy = policy();
        let login = policy.verify_credentials("alice", "wonderland").await.unwrap();

        assert_eq!(login.principal.username(), "alice");
        assert_eq!(login.principal.role(), Some(Role::User));
        let claims = policy.codec().verify(&login.issued.token).unwrap();
        assert_eq!(claims, login.issued.claims);
        assert_eq!(claims.user_id, login.principal.user_id());
        assert!(uuid::Uuid::parse_str(&claims.user_id).is_ok());
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let result = policy().verify_credentials("alice", "looking-glass").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn verifier_timeout_is_invalid_credentials() {
        let policy =
            policy_with(Arc::new(Stalled)).with_credential_timeout(Duration::from_millis(20));
        let result = policy.verify_credentials("alice", "wonderland").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn verifier_failure_is_invalid_credentials() {
        let result = policy_with(Arc::new(Broken))
            .verify_credentials("alice", "wonderland")
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn authorize_uses_the_role_hook() {
        let admin = VerifiedUser {
            user_id: uuid::Uuid::new_v4(),
            username: "root".to_string(),
            role: Some(Role::Admin),
        };
        let policy = policy_with(Arc::new(Fixed(admin)));
        let login = policy.verify_credentials("root", "x").await.unwrap();
        assert!(policy.authorize(&login.principal, Role::Admin));
        assert!(policy.authorize(&login.principal, Role::User));

        let roleless = VerifiedUser {
            user_id: uuid::Uuid::new_v4(),
            username: "guest".to_string(),
            role: None,
        };
        let policy = policy_with(Arc::new(Fixed(roleless)));
        let login = policy.verify_credentials("guest", "x").await.unwrap();
        assert!(!policy.authorize(&login.principal, Role::User));
        assert!(login.issued.claims.role.is_none());
    }
}
