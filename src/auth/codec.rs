// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Compact HS256 token signing and verification.
//!
//! Tokens are standard JWS compact JWTs (`header.claims.signature`), so any
//! service holding the same secret and a JWT library can read or mint them.
//!
//! ## Verification Order
//!
//! 1. Structure: three non-empty base64url segments (`Malformed`)
//! 2. Header algorithm and signature (`Malformed` / `BadSignature`)
//! 3. Claims decode and consistency (`Malformed`)
//! 4. Lifetime: `exp` strictly in the future (`Expired`)
//!
//! The first failing step ends verification. Claims are only returned when
//! every step passes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, Header, Validation};

use super::claims::{ClaimsError, ClaimsSet};
use super::error::{AuthError, TokenError};
use super::key::KeyMaterial;
use super::roles::Role;

/// The only algorithm this codec signs or accepts.
pub const ALGORITHM: Algorithm = Algorithm::HS256;

/// A freshly signed token together with the claims inside it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: ClaimsSet,
}

/// Signs and verifies tokens with one shared key.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    key: Arc<KeyMaterial>,
    ttl: Duration,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec issuing tokens valid for `ttl`.
    pub fn new(key: Arc<KeyMaterial>, ttl: Duration) -> Self {
        // Expiry is checked by `ClaimsSet::is_expired_at`, without leeway,
        // after the signature.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            key,
            ttl,
            validation,
        }
    }

    /// Lifetime of tokens minted by [`TokenCodec::issue`].
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current time in epoch seconds. Used for both issuance and expiry.
    pub fn now() -> i64 {
        Utc::now().timestamp()
    }

    /// Serialize and sign a claim set.
    pub fn sign(&self, claims: &ClaimsSet) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(ALGORITHM), claims, self.key.encoding_key())
    }

    /// Build claims for a verified identity at the current time and sign them.
    pub fn issue(
        &self,
        subject: &str,
        user_id: &str,
        role: Option<Role>,
    ) -> Result<IssuedToken, AuthError> {
        self.issue_at(subject, user_id, role, Self::now())
    }

    /// [`TokenCodec::issue`] with an explicit clock reading.
    pub fn issue_at(
        &self,
        subject: &str,
        user_id: &str,
        role: Option<Role>,
        now: i64,
    ) -> Result<IssuedToken, AuthError> {
        let mut claims = ClaimsSet::new(subject, user_id, now, self.ttl)
            .map_err(|e: ClaimsError| AuthError::Internal(e.to_string()))?;
        if let Some(role) = role {
            claims = claims.with_role(role);
        }
        let token = self
            .sign(&claims)
            .map_err(|e| AuthError::Internal(format!("failed to encode claims: {e}")))?;
        Ok(IssuedToken { token, claims })
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<ClaimsSet, TokenError> {
        self.verify_at(token, Self::now())
    }

    /// Verify a token against an explicit clock reading.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<ClaimsSet, TokenError> {
        if !is_well_formed(token) {
            return Err(TokenError::Malformed);
        }

        let claims = decode::<ClaimsSet>(token, self.key.decoding_key(), &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            })?
            .claims;

        if !claims.is_consistent() {
            return Err(TokenError::Malformed);
        }
        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// `verify` collapsed to a boolean.
    pub fn is_valid(&self, token: &str) -> bool {
        self.verify(token).is_ok()
    }

    /// Canonical username of a valid token.
    pub fn extract_username(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token).map(|claims| claims.subject)
    }

    /// User identifier of a valid token.
    pub fn extract_user_id(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token).map(|claims| claims.user_id)
    }
}

/// Exactly three non-empty segments of the unpadded base64url alphabet.
fn is_well_formed(token: &str) -> bool {
    let mut segments = 0;
    for segment in token.split('.') {
        segments += 1;
        if segment.is_empty()
            || !segment
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return false;
        }
    }
    segments == 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{
        engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
        Engine,
    };
    use hmac::{Hmac, Mac};
    use jsonwebtoken::{DecodingKey, EncodingKey};
    use sha2::Sha256;

    const SECRET: &str = "abcdefghijklmnopqrstuvwxyzABCDEF";
    const OTHER_SECRET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdef";

    fn codec_with(secret: &str, ttl: Duration) -> TokenCodec {
        TokenCodec::new(Arc::new(KeyMaterial::load(secret).unwrap()), ttl)
    }

    fn codec() -> TokenCodec {
        codec_with(SECRET, Duration::from_secs(60))
    }

    fn craft(header: &serde_json::Value, payload: &serde_json::Value, secret: &str) -> String {
        craft_raw(&header.to_string(), payload, secret)
    }

    /// Sign an arbitrary header text, byte for byte.
    fn craft_raw(header: &str, payload: &serde_json::Value, secret: &str) -> String {
        let input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        );
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(input.as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{input}.{sig}")
    }

    #[test]
    fn round_trip_returns_identical_claims() {
        let codec = codec();
        let claims = ClaimsSet::new("alice", "1111-2222", TokenCodec::now(), codec.ttl())
            .unwrap()
            .with_role(Role::User);
        let token = codec.sign(&claims).unwrap();
        assert_eq!(codec.verify(&token).unwrap(), claims);
    }

    #[test]
    fn token_has_three_url_safe_segments() {
        let issued = codec().issue("alice", "1111-2222", None).unwrap();
        let segments: Vec<&str> = issued.token.split('.').collect();
        assert_eq!(segments.len(), 3);
        for segment in segments {
            assert!(segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
        assert!(!issued.token.contains(SECRET));
    }

    #[test]
    fn scenario_alice() {
        let codec = codec();
        let issued = codec.issue("alice", "1111-2222", None).unwrap();
        assert!(codec.is_valid(&issued.token));
        assert_eq!(codec.extract_username(&issued.token).unwrap(), "alice");
        assert_eq!(codec.extract_user_id(&issued.token).unwrap(), "1111-2222");
    }

    #[test]
    fn any_single_character_change_is_rejected() {
        let codec = codec();
        let token = codec.issue("alice", "1111-2222", Some(Role::Admin)).unwrap().token;

        for (index, original) in token.char_indices() {
            let replacement = if original == 'A' { 'B' } else { 'A' };
            let mut tampered = token.clone();
            tampered.replace_range(index..index + 1, &replacement.to_string());

            let result = codec.verify(&tampered);
            assert!(
                matches!(result, Err(TokenError::BadSignature | TokenError::Malformed)),
                "position {index} accepted or misclassified: {result:?}"
            );
        }
    }

    #[test]
    fn flipped_signature_bit_is_bad_signature() {
        let codec = codec();
        let token = codec.issue("alice", "1111-2222", None).unwrap().token;
        let (input, sig) = token.rsplit_once('.').unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(sig).unwrap();
        raw[0] ^= 0x01;
        let forged = format!("{input}.{}", URL_SAFE_NO_PAD.encode(raw));
        assert_eq!(codec.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn structural_garbage_is_malformed() {
        let codec = codec();
        for token in [
            "",
            "not.a.token",
            "onlyone",
            "two.parts",
            "a.b.c.d",
            "..",
            "eyJhbGciOiJIUzI1NiJ9..sig",
            "!!!.###.$$$",
        ] {
            assert_eq!(codec.verify(token), Err(TokenError::Malformed), "{token:?}");
            assert!(!codec.is_valid(token));
        }
    }

    #[test]
    fn extractors_fail_where_is_valid_is_false() {
        let codec = codec();
        assert!(!codec.is_valid("not.a.token"));
        assert_eq!(codec.extract_username("not.a.token"), Err(TokenError::Malformed));
        assert_eq!(codec.extract_user_id("not.a.token"), Err(TokenError::Malformed));
    }

    #[test]
    fn token_from_other_key_is_bad_signature() {
        let token = codec_with(OTHER_SECRET, Duration::from_secs(60))
            .issue("alice", "1111-2222", None)
            .unwrap()
            .token;
        assert_eq!(codec().verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn expiry_is_checked_after_signature() {
        let codec = codec();
        let issued = codec.issue_at("alice", "1111-2222", None, 1_000).unwrap();
        assert_eq!(issued.claims.expires_at, 1_060);

        assert!(codec.verify_at(&issued.token, 1_059).is_ok());
        assert_eq!(codec.verify_at(&issued.token, 1_060), Err(TokenError::Expired));
        assert_eq!(codec.verify_at(&issued.token, 5_000), Err(TokenError::Expired));

        // A forged expired token reports the signature, not the expiry.
        let foreign = codec_with(OTHER_SECRET, Duration::from_secs(60))
            .issue_at("alice", "1111-2222", None, 1_000)
            .unwrap();
        assert_eq!(
            codec.verify_at(&foreign.token, 5_000),
            Err(TokenError::BadSignature)
        );
    }

    #[tokio::test]
    async fn one_second_token_lapses() {
        let codec = codec_with(SECRET, Duration::from_secs(1));
        let token = codec.issue("u", "id", None).unwrap().token;
        assert!(codec.is_valid(&token));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(!codec.is_valid(&token));
        assert_eq!(codec.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn raw_and_base64_secrets_are_interchangeable() {
        let raw = codec();
        let encoded = codec_with(
            &format!("base64:{}", STANDARD.encode(SECRET)),
            Duration::from_secs(60),
        );

        let claims = ClaimsSet::new("alice", "1111-2222", TokenCodec::now(), raw.ttl()).unwrap();
        let from_raw = raw.sign(&claims).unwrap();
        let from_encoded = encoded.sign(&claims).unwrap();

        assert_eq!(from_raw, from_encoded);
        assert_eq!(encoded.verify(&from_raw).unwrap(), claims);
        assert_eq!(raw.verify(&from_encoded).unwrap(), claims);
    }

    #[test]
    fn foreign_algorithm_is_malformed_even_when_signed() {
        let now = TokenCodec::now();
        let payload = serde_json::json!({"sub": "alice", "userId": "1", "iat": now, "exp": now + 60});
        let token = craft(&serde_json::json!({"alg": "none"}), &payload, SECRET);
        assert_eq!(codec().verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn legacy_lowercase_userid_is_rejected() {
        let now = TokenCodec::now();
        let payload = serde_json::json!({
            "sub": "alice",
            "username": "alice",
            "userid": "1111-2222",
            "iat": now,
            "exp": now + 60,
        });
        let token = craft(&serde_json::json!({"alg": "HS256"}), &payload, SECRET);
        assert_eq!(codec().verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn username_copy_must_match_subject() {
        let now = TokenCodec::now();
        let payload = serde_json::json!({
            "sub": "alice",
            "username": "mallory",
            "userId": "1111-2222",
            "iat": now,
            "exp": now + 60,
        });
        let token = craft(&serde_json::json!({"alg": "HS256"}), &payload, SECRET);
        assert_eq!(codec().verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn extra_claims_from_other_services_are_tolerated() {
        let now = TokenCodec::now();
        let payload = serde_json::json!({
            "sub": "alice",
            "userId": "1111-2222",
            "iat": now,
            "exp": now + 60,
            "firstName": "Alice",
        });
        let token = craft(&serde_json::json!({"alg": "HS256", "typ": "JWT"}), &payload, SECRET);
        let claims = codec().verify(&token).unwrap();
        assert_eq!(claims.username(), "alice");
        assert_eq!(claims.username, None);
    }

    #[test]
    fn escaped_header_text_is_accepted() {
        let now = TokenCodec::now();
        let payload = serde_json::json!({"sub": "alice", "userId": "1", "iat": now, "exp": now + 60});
        // "J\u0057T" is JSON for "JWT".
        let token = craft_raw(r#"{"alg":"HS256","typ":"J\u0057T"}"#, &payload, SECRET);

        let claims = codec().verify(&token).unwrap();
        assert_eq!(claims.subject, "alice");
    }

    #[test]
    fn standard_library_accepts_our_tokens() {
        let issued = codec().issue("alice", "1111-2222", Some(Role::User)).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        let decoded = jsonwebtoken::decode::<serde_json::Value>(
            &issued.token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims["sub"], "alice");
        assert_eq!(decoded.claims["userId"], "1111-2222");
        assert_eq!(decoded.claims["role"], "user");
        assert_eq!(decoded.claims["exp"], issued.claims.expires_at);
    }

    #[test]
    fn we_accept_standard_library_tokens() {
        let now = TokenCodec::now();
        let payload = serde_json::json!({
            "sub": "bob",
            "username": "bob",
            "userId": "3f2c1d1e-0000-4000-8000-000000000000",
            "iat": now,
            "exp": now + 60,
        });
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let claims = codec().verify(&token).unwrap();
        assert_eq!(claims.subject, "bob");
        assert_eq!(claims.user_id, "3f2c1d1e-0000-4000-8000-000000000000");
    }
}
