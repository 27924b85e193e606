// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::auth::ClaimsSet;
use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Whether a sample token signs and verifies with the loaded key.
    pub signing: String,
}

/// Simple health check response for liveness checks.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

fn check_signing(state: &AppState) -> bool {
    let codec = state.policy().codec();
    let now = crate::auth::TokenCodec::now();
    let Ok(sample) = ClaimsSet::new("health", "health", now, codec.ttl()) else {
        return false;
    };
    codec
        .sign(&sample)
        .ok()
        .and_then(|token| codec.verify_at(&token, now).ok())
        .is_some_and(|claims| claims == sample)
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let signing_ok = check_signing(&state);

    let response = ReadyResponse {
        status: if signing_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            signing: if signing_ok { "ok" } else { "failing" }.to_string(),
        },
    };

    let status = if signing_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness handler.
///
/// Always returns 200 if the process is running.
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
