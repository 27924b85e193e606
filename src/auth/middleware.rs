// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication gate for Axum.
//!
//! Every request passes through [`auth_middleware`] before routing reaches a
//! handler. The decision itself lives in [`AuthGate::evaluate`], which is a
//! pure function of method, path and headers:
//!
//! 1. `OPTIONS` preflight (when allowed) → bypassed
//! 2. public route → bypassed, no principal
//! 3. no `Authorization: Bearer <token>` → rejected (401)
//! 4. token fails verification → rejected (401)
//! 5. route requires a role the principal lacks → rejected (403)
//! 6. otherwise → authenticated, [`Principal`] attached to extensions
//!
//! Public-route matching always happens before the header is looked at.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::claims::Principal;
use super::error::AuthError;
use super::policy::AuthorizationPolicy;

/// Terminal state of one gate evaluation.
#[derive(Debug)]
pub enum GateOutcome {
    /// Public route or preflight; downstream runs without a principal.
    Bypassed,
    /// Token verified; downstream runs with this principal.
    Authenticated(Principal),
    /// Downstream never runs.
    Rejected(AuthError),
}

/// Request gate state shared by all requests.
#[derive(Clone)]
pub struct AuthGate {
    policy: Arc<AuthorizationPolicy>,
}

impl AuthGate {
    pub fn new(policy: Arc<AuthorizationPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    /// Decide what happens to a request.
    pub fn evaluate(&self, method: &Method, path: &str, headers: &HeaderMap) -> GateOutcome {
        if *method == Method::OPTIONS && self.policy.allows_preflight() {
            return GateOutcome::Bypassed;
        }
        if self.policy.is_public(path) {
            return GateOutcome::Bypassed;
        }

        let Some(token) = bearer_token(headers) else {
            return GateOutcome::Rejected(AuthError::MissingToken);
        };

        let claims = match self.policy.codec().verify(token) {
            Ok(claims) => claims,
            Err(e) => return GateOutcome::Rejected(e.into()),
        };
        let principal = Principal::from_claims(claims);

        if let Some(required) = self.policy.required_role(path) {
            if !self.policy.authorize(&principal, required) {
                return GateOutcome::Rejected(AuthError::InsufficientPermissions);
            }
        }

        GateOutcome::Authenticated(principal)
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively. Any other scheme, a non-ASCII
/// header, or an empty token counts as no token at all.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Authentication middleware function.
///
/// # Usage
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/protected", get(protected_handler))
///     .layer(axum::middleware::from_fn_with_state(gate, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = gate.evaluate(request.method(), request.uri().path(), request.headers());

    match outcome {
        GateOutcome::Bypassed => next.run(request).await,
        GateOutcome::Authenticated(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        GateOutcome::Rejected(error) => {
            let remote = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.to_string())
                .unwrap_or_else(|| "unknown".to_string());

            tracing::warn!(
                target: "audit",
                method = %request.method(),
                path = %request.uri().path(),
                remote = %remote,
                reason = error.kind(),
                "Rejected unauthenticated request"
            );
            error.into_response()
        }
    }
}
