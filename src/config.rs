// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values, and the
//! [`ServerConfig`] loaded from them once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for blobs, database and audit logs | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` | PEM certificate chain (HTTPS when set with key) | unset |
//! | `TLS_KEY_PATH` | PEM private key (HTTPS when set with cert) | unset |
//! | `MAX_CONTENT_BYTES` | Largest accepted decoded ciphertext | `26214400` |
//! | `OWNER_HEADER` | Header carrying the upstream-verified owner id | `x-owner-id` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::path::PathBuf;

use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the data directory path.
///
/// Blobs, the metadata database and the audit log all live below it.
///
/// # Default
/// `/data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const MAX_CONTENT_BYTES_ENV: &str = "MAX_CONTENT_BYTES";
pub const OWNER_HEADER_ENV: &str = "OWNER_HEADER";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// 25 MiB of decoded ciphertext per note.
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 25 * 1024 * 1024;

/// Header set by the authenticating gateway in front of this service.
pub const DEFAULT_OWNER_HEADER: &str = "x-owner-id";

pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// PEM files used to serve HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Server configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsPaths>,
    pub max_content_bytes: usize,
    pub owner_header: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_ROOT),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tls: None,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            owner_header: DEFAULT_OWNER_HEADER.to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let tls = match (lookup(TLS_CERT_PATH_ENV), lookup(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) if !cert.is_empty() && !key.is_empty() => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            _ => None,
        };

        Self {
            data_dir: lookup(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            host: lookup(HOST_ENV).unwrap_or(defaults.host),
            port: lookup(PORT_ENV)
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            tls,
            max_content_bytes: lookup(MAX_CONTENT_BYTES_ENV)
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(defaults.max_content_bytes),
            owner_header: lookup(OWNER_HEADER_ENV)
                .map(|h| h.to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .unwrap_or(defaults.owner_header),
            log_format: lookup(LOG_FORMAT_ENV)
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
        }
    }

    /// Configuration rooted at a custom data directory (useful for testing).
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
