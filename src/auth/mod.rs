// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Stateless HS256 bearer tokens shared by every Spring Boosters service.
//!
//! ## Auth Flow
//!
//! 1. Client posts username and password to `/api/v1/auth/login`
//! 2. [`AuthorizationPolicy`] checks them with the [`CredentialVerifier`]
//!    and has the [`TokenCodec`] sign a fresh [`ClaimsSet`]
//! 3. Client sends `Authorization: Bearer <token>` on later requests
//! 4. The gate ([`auth_middleware`]) verifies signature and expiry and
//!    attaches a [`Principal`] to the request
//!
//! ## Security
//!
//! - The signing secret is validated once at start-up (≥ 256 bits)
//! - Signatures are compared in constant time
//! - Every token failure yields the same 401 response
//! - No server-side session state; nothing is cached between requests

pub mod claims;
pub mod codec;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod key;
pub mod middleware;
pub mod policy;
pub mod roles;

pub use claims::{ClaimsSet, Principal};
pub use codec::{IssuedToken, TokenCodec};
pub use credentials::{CredentialVerifier, InMemoryCredentials};
pub use error::{AuthError, KeyError, TokenError};
pub use extractor::{AdminOnly, Auth, OptionalAuth};
pub use key::KeyMaterial;
pub use middleware::{auth_middleware, AuthGate, GateOutcome};
pub use policy::{AuthorizationPolicy, IssuedLogin, RoutePattern};
pub use roles::Role;
