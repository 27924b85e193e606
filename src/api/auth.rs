// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login and identity endpoints.

use std::fmt;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{Auth, AuthError, IssuedLogin, Principal};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl LoginResponse {
    fn issued(login: IssuedLogin) -> Self {
        let IssuedLogin { principal, issued } = login;
        Self {
            success: true,
            message: "Login successful".to_string(),
            username: Some(principal.username().to_string()),
            token: Some(issued.token),
            expires_at: DateTime::from_timestamp(issued.claims.expires_at, 0),
            principal: Some(principal),
        }
    }

    fn rejected() -> Self {
        Self {
            success: false,
            message: "Invalid credentials".to_string(),
            username: None,
            token: None,
            principal: None,
            expires_at: None,
        }
    }
}

/// Exchange a username and password for a bearer token.
///
/// Public route. Unknown users, wrong passwords and slow verifiers all
/// produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::bad_request(rejection.body_text()).into_response(),
    };

    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return ApiError::bad_request("username and password are required").into_response();
    }

    match state
        .policy()
        .verify_credentials(username, &request.password)
        .await
    {
        Ok(login) => Json(LoginResponse::issued(login)).into_response(),
        Err(AuthError::InvalidCredentials) => {
            (StatusCode::UNAUTHORIZED, Json(LoginResponse::rejected())).into_response()
        }
        Err(other) => ApiError::internal(other).into_response(),
    }
}

/// The principal the gate attached to this request.
pub async fn me(Auth(principal): Auth) -> Json<Principal> {
    Json(principal)
}
