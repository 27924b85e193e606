// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Three layers of failure live here:
//!
//! - [`KeyError`] - the signing secret is unusable. Fatal at start-up.
//! - [`TokenError`] - a presented token failed verification.
//! - [`AuthError`] - what the gate and the login path report to clients.
//!
//! Every token failure renders the same 401 response. The specific
//! [`TokenError`] kind is only ever written to the server log.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use super::key::MIN_KEY_LEN;

/// The shared signing secret cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Decoded secret is shorter than 256 bits.
    #[error("signing secret is too short ({len} bytes, at least {min} required)", min = MIN_KEY_LEN)]
    TooShort { len: usize },
    /// The `base64:` payload is not valid standard base64.
    #[error("signing secret has an invalid base64 payload")]
    InvalidBase64,
}

/// Token verification failure.
///
/// The variants follow the order in which verification runs: structure,
/// then signature, then lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Wrong segment count, bad encoding, or undecodable header/claims.
    #[error("token is malformed")]
    Malformed,
    /// MAC mismatch: tampered or forged.
    #[error("token signature is invalid")]
    BadSignature,
    /// Signature is valid but the token has lapsed.
    #[error("token has expired")]
    Expired,
}

impl TokenError {
    /// Stable identifier for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::BadSignature => "bad_signature",
            TokenError::Expired => "expired",
        }
    }
}

/// Authentication error type returned by the gate, extractors and login.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable `Authorization: Bearer` header.
    #[error("missing bearer token")]
    MissingToken,
    /// A token was presented but did not verify.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
    /// Login failed. Covers unknown users, wrong passwords and verifier timeouts.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Authenticated, but the route requires a role the principal lacks.
    #[error("insufficient permissions for this operation")]
    InsufficientPermissions,
    /// Internal error
    #[error("internal authentication error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
}

impl AuthError {
    /// Internal classification for logs. Never sent to the client.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken(e) => e.kind(),
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidToken(_)
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Token failures collapse into one string so the
    /// response cannot be used to tell which check failed.
    fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken(_) => "unauthorized",
            AuthError::InvalidCredentials => "invalid credentials",
            AuthError::InsufficientPermissions => "forbidden",
            AuthError::Internal(_) => "internal error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.public_message(),
        });
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
