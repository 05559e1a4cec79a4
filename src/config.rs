// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AWS_REGION` | User pool region | Required |
//! | `AWS_COGNITO_POOL` | User pool id | Required |
//! | `COGNITO_CLIENT_ID` | Expected `aud` of id tokens | Audience not checked |
//! | `TTL_JWK_CACHE` | Key cache TTL in seconds | `3600` |
//! | `JWKS_URL` | Override of the pool JWKS URL | Derived from region and pool |
//! | `TOKEN_PARAM` | Request parameter carrying the token | `_jwt` |
//! | `REDIS_HOST` | Shared cache host | In-process cache |
//! | `REDIS_PORT` | Shared cache port | `6379` |
//! | `REDIS_PASSWORD` | Shared cache password | None |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | Plain HTTP |
//! | `LOG_NAME` | Service name attached to every log line | `cognito-gate` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::middleware::DEFAULT_TOKEN_PARAM;
use crate::cache::RedisSettings;

pub const AWS_REGION_ENV: &str = "AWS_REGION";
pub const AWS_COGNITO_POOL_ENV: &str = "AWS_COGNITO_POOL";
pub const COGNITO_CLIENT_ID_ENV: &str = "COGNITO_CLIENT_ID";
pub const TTL_JWK_CACHE_ENV: &str = "TTL_JWK_CACHE";
pub const JWKS_URL_ENV: &str = "JWKS_URL";
pub const TOKEN_PARAM_ENV: &str = "TOKEN_PARAM";
pub const REDIS_HOST_ENV: &str = "REDIS_HOST";
pub const REDIS_PORT_ENV: &str = "REDIS_PORT";
pub const REDIS_PASSWORD_ENV: &str = "REDIS_PASSWORD";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_NAME_ENV: &str = "LOG_NAME";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Key cache TTL when `TTL_JWK_CACHE` is unset.
pub const DEFAULT_TTL_JWK_CACHE_SECS: u64 = 3600;
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_NAME: &str = "cognito-gate";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub region: String,
    pub pool_id: String,
    pub client_id: Option<String>,
    pub jwks_ttl: Duration,
    pub jwks_url: String,
    pub token_param: String,
    pub redis: Option<RedisSettings>,
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsPaths>,
    pub log_name: String,
    pub log_format: LogFormat,
}

/// `https://cognito-idp.{region}.amazonaws.com/{pool}/.well-known/jwks.json`
pub fn jwks_url(region: &str, pool_id: &str) -> String {
    format!("{}/.well-known/jwks.json", issuer(region, pool_id))
}

/// Expected `iss` of tokens minted by the pool.
pub fn issuer(region: &str, pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{pool_id}")
}

impl Config {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] for a missing required variable or an unparseable number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let region = required(AWS_REGION_ENV)?;
        let pool_id = required(AWS_COGNITO_POOL_ENV)?;

        let ttl_secs = match var(TTL_JWK_CACHE_ENV) {
            Some(raw) => parse_number::<u64>(TTL_JWK_CACHE_ENV, &raw)?,
            None => DEFAULT_TTL_JWK_CACHE_SECS,
        };
        if ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                name: TTL_JWK_CACHE_ENV,
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let redis = match var(REDIS_HOST_ENV) {
            Some(host) => {
                let port = match var(REDIS_PORT_ENV) {
                    Some(raw) => parse_number::<u16>(REDIS_PORT_ENV, &raw)?,
                    None => DEFAULT_REDIS_PORT,
                };
                let settings = RedisSettings::new(host, port);
                Some(match var(REDIS_PASSWORD_ENV) {
                    Some(password) => settings.with_password(password),
                    None => settings,
                })
            }
            None => None,
        };

        let port = match var(PORT_ENV) {
            Some(raw) => parse_number::<u16>(PORT_ENV, &raw)?,
            None => DEFAULT_PORT,
        };

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let log_format = match var(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") | None => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    value: other.to_string(),
                    reason: "expected json or pretty".to_string(),
                })
            }
        };

        Ok(Self {
            jwks_url: var(JWKS_URL_ENV).unwrap_or_else(|| jwks_url(&region, &pool_id)),
            client_id: var(COGNITO_CLIENT_ID_ENV),
            jwks_ttl: Duration::from_secs(ttl_secs),
            token_param: var(TOKEN_PARAM_ENV).unwrap_or_else(|| DEFAULT_TOKEN_PARAM.to_string()),
            redis,
            host: var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            tls,
            log_name: var(LOG_NAME_ENV).unwrap_or_else(|| DEFAULT_LOG_NAME.to_string()),
            log_format,
            region,
            pool_id,
        })
    }

    pub fn issuer(&self) -> String {
        issuer(&self.region, &self.pool_id)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
