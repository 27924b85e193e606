// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared signing secret.
//!
//! The secret is configured either as a raw UTF-8 string or as
//! `base64:<standard base64>`. Only the decoded byte length decides whether
//! it is acceptable, and that decision happens once, at start-up.

use std::fmt;

use base64ct::{Base64, Encoding};
use jsonwebtoken::{DecodingKey, EncodingKey};

use super::error::KeyError;

/// Minimum decoded secret length for HS256 (256 bits).
pub const MIN_KEY_LEN: usize = 32;

/// Prefix marking a base64-encoded secret.
pub const BASE64_PREFIX: &str = "base64:";

/// Validated HMAC-SHA256 signing key.
///
/// Both JWT keys are derived once here. Immutable for the life of the
/// process; share it behind an `Arc`.
#[derive(Clone)]
pub struct KeyMaterial {
    encoding: EncodingKey,
    decoding: DecodingKey,
    len: usize,
}

impl KeyMaterial {
    /// Decode and validate a configured secret.
    pub fn load(secret_source: &str) -> Result<Self, KeyError> {
        let bytes = match secret_source.strip_prefix(BASE64_PREFIX) {
            Some(encoded) => {
                Base64::decode_vec(encoded.trim()).map_err(|_| KeyError::InvalidBase64)?
            }
            None => secret_source.as_bytes().to_vec(),
        };
        Self::from_bytes(&bytes)
    }

    /// Build from already-decoded bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() < MIN_KEY_LEN {
            return Err(KeyError::TooShort { len: bytes.len() });
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            len: bytes.len(),
        })
    }

    /// Decoded secret length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; an empty key cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}
