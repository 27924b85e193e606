// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup into an
//! immutable [`Config`]. Nothing re-reads the environment afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `JWT_SECRET` | Shared signing secret, raw or `base64:<b64>` (≥ 32 bytes) | Required |
//! | `JWT_TTL_SECONDS` | Lifetime of issued tokens | `86400` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `PUBLIC_PATHS` | Comma-separated routes reachable without a token | login, register, `/health/**` |
//! | `ROLE_RULES` | Comma-separated `pattern=role` requirements | none |
//! | `AUTH_USERS` | Comma-separated `username:password[:role]` bootstrap accounts | none |
//! | `CREDENTIAL_TIMEOUT_MS` | Upper bound on one credential check | `2000` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files enabling HTTPS | plain HTTP |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::auth::policy::{PatternError, DEFAULT_CREDENTIAL_TIMEOUT, DEFAULT_PUBLIC_ROUTES};
use crate::auth::{ClaimsSet, KeyError, KeyMaterial, Role, RoutePattern, TokenCodec};

/// Environment variable holding the shared signing secret.
///
/// Every service that accepts tokens must be deployed with the same value.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// Environment variable for the token lifetime in seconds.
pub const JWT_TTL_ENV: &str = "JWT_TTL_SECONDS";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const PUBLIC_PATHS_ENV: &str = "PUBLIC_PATHS";
pub const ROLE_RULES_ENV: &str = "ROLE_RULES";
pub const AUTH_USERS_ENV: &str = "AUTH_USERS";
pub const CREDENTIAL_TIMEOUT_ENV: &str = "CREDENTIAL_TIMEOUT_MS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// One day.
pub const DEFAULT_TTL_SECONDS: u64 = 86_400;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("JWT_TTL_SECONDS={0} puts token expiry beyond the representable range")]
    TtlOutOfRange(u64),
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),
    #[error("invalid route pattern in {var}: {source}")]
    InvalidPattern {
        var: &'static str,
        #[source]
        source: PatternError,
    },
    #[error("invalid role rule {0:?}, expected pattern=role")]
    InvalidRoleRule(String),
    #[error("unknown role {0:?}")]
    UnknownRole(String),
    /// The password is never part of the message.
    #[error("invalid entry #{0} in AUTH_USERS, expected username:password[:role]")]
    InvalidUser(usize),
    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    IncompleteTls,
    #[error("LOG_FORMAT must be json or pretty, got {0:?}")]
    InvalidLogFormat(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Bootstrap account from `AUTH_USERS`.
#[derive(Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub username: String,
    pub password: String,
    pub role: Option<Role>,
}

impl fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserEntry")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// PEM certificate chain and private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub key: Arc<KeyMaterial>,
    pub token_ttl: Duration,
    pub bind_addr: SocketAddr,
    pub public_routes: Vec<RoutePattern>,
    pub role_rules: Vec<(RoutePattern, Role)>,
    pub users: Vec<UserEntry>,
    pub credential_timeout: Duration,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        // The secret is used byte for byte, surrounding whitespace included.
        let secret = lookup(JWT_SECRET_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?;
        let key = Arc::new(KeyMaterial::load(&secret)?);

        let token_ttl = Duration::from_secs(positive(
            JWT_TTL_ENV,
            get(JWT_TTL_ENV),
            DEFAULT_TTL_SECONDS,
        )?);
        // Same check every issuance runs, so a bad lifetime stops start-up
        // instead of failing each login.
        ClaimsSet::new("startup", "startup", TokenCodec::now(), token_ttl)
            .map_err(|_| ConfigError::TtlOutOfRange(token_ttl.as_secs()))?;
        let credential_timeout = match get(CREDENTIAL_TIMEOUT_ENV) {
            Some(value) => {
                Duration::from_millis(positive(CREDENTIAL_TIMEOUT_ENV, Some(value), 0)?)
            }
            None => DEFAULT_CREDENTIAL_TIMEOUT,
        };

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidNumber {
                var: PORT_ENV,
                value,
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = parse_bind_addr(&host, port)?;

        let public_routes = match get(PUBLIC_PATHS_ENV) {
            Some(value) => parse_routes(&value)?,
            None => parse_routes(&DEFAULT_PUBLIC_ROUTES.join(","))?,
        };
        let role_rules = get(ROLE_RULES_ENV)
            .map(|value| parse_role_rules(&value))
            .transpose()?
            .unwrap_or_default();
        let users = get(AUTH_USERS_ENV)
            .map(|value| parse_users(&value))
            .transpose()?
            .unwrap_or_default();

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTls),
        };

        let log_format = match get(LOG_FORMAT_ENV) {
            None => LogFormat::default(),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => return Err(ConfigError::InvalidLogFormat(value)),
            },
        };

        Ok(Self {
            key,
            token_ttl,
            bind_addr,
            public_routes,
            role_rules,
            users,
            credential_timeout,
            tls,
            log_format,
        })
    }
}

fn positive(var: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber { var, value }),
    }
}

fn parse_bind_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let joined = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    joined
        .parse()
        .map_err(|_| ConfigError::InvalidBindAddress(joined))
}

fn list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_routes(value: &str) -> Result<Vec<RoutePattern>, ConfigError> {
    list(value)
        .map(|p| {
            RoutePattern::parse(p).map_err(|source| ConfigError::InvalidPattern {
                var: PUBLIC_PATHS_ENV,
                source,
            })
        })
        .collect()
}

fn parse_role_rules(value: &str) -> Result<Vec<(RoutePattern, Role)>, ConfigError> {
    list(value)
        .map(|rule| {
            let (pattern, role) = rule
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidRoleRule(rule.to_string()))?;
            let pattern =
                RoutePattern::parse(pattern).map_err(|source| ConfigError::InvalidPattern {
                    var: ROLE_RULES_ENV,
                    source,
                })?;
            let role = Role::parse(role.trim())
                .ok_or_else(|| ConfigError::UnknownRole(role.trim().to_string()))?;
            Ok((pattern, role))
        })
        .collect()
}

/// The role is the last field of an entry with three or more fields, so a
/// password containing ':' needs an explicit (possibly empty) role.
fn parse_users(value: &str) -> Result<Vec<UserEntry>, ConfigError> {
    list(value)
        .enumerate()
        .map(|(index, entry)| {
            let invalid = || ConfigError::InvalidUser(index + 1);
            let (username, rest) = entry.split_once(':').ok_or_else(invalid)?;
            let (password, role) = match rest.rsplit_once(':') {
                Some((password, role)) => (password, role.trim()),
                None => (rest, ""),
            };
            let username = username.trim();
            if username.is_empty() || password.is_empty() {
                return Err(invalid());
            }
            let role = if role.is_empty() {
                None
            } else {
                Some(Role::parse(role).ok_or_else(|| ConfigError::UnknownRole(role.to_string()))?)
            };
            Ok(UserEntry {
                username: username.to_string(),
                password: password.to_string(),
                role,
            })
        })
        .collect()
}
