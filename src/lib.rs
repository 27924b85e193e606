// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Booster Auth - Stateless Bearer-Token Authentication
//!
//! Issues and verifies HS256 bearer tokens with a shared secret, and gates
//! HTTP requests on them. No session state is kept between requests.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and router (Axum)
//! - `auth` - Key material, token codec, gate and policy
//! - `config` - Environment configuration
//! - `telemetry` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
pub mod telemetry;
