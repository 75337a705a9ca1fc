//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_INIT_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_LOGIN_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid BITACORA_API_URL `{0}`: expected an http:// or https:// URL")]
    InvalidApiUrl(String),
    #[error("no storage path: set BITACORA_STORAGE_PATH, XDG_CONFIG_HOME or HOME")]
    NoStoragePath,
}

/// Bounds on the session manager's two timed races.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthTimeouts {
    /// How long startup waits for session hydration.
    pub init: Duration,
    /// How long a credential exchange may take.
    pub login: Duration,
}

impl Default for AuthTimeouts {
    fn default() -> Self {
        Self {
            init: Duration::from_millis(DEFAULT_INIT_TIMEOUT_MS),
            login: Duration::from_millis(DEFAULT_LOGIN_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect_secs: u64,
    pub request_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS, request_secs: DEFAULT_REQUEST_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub storage_path: PathBuf,
    pub auth: AuthTimeouts,
    pub http: HttpTimeouts,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `BITACORA_API_URL`: backend origin, default `http://localhost:8000`
    /// - `BITACORA_STORAGE_PATH`: token storage file, default
    ///   `$XDG_CONFIG_HOME/bitacora/storage.json` (or `$HOME/.config/...`)
    /// - `BITACORA_INIT_TIMEOUT_MS`: default 3000
    /// - `BITACORA_LOGIN_TIMEOUT_MS`: default 10000
    /// - `BITACORA_CONNECT_TIMEOUT_SECS`: default 10
    /// - `BITACORA_REQUEST_TIMEOUT_SECS`: default 30
    ///
    /// # Errors
    ///
    /// Returns an error for a non-http(s) API URL or when no storage
    /// location can be derived.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`], reading variables through `var`.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(var("BITACORA_API_URL").as_deref())?;
        let storage_path = match var("BITACORA_STORAGE_PATH").filter(|p| !p.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_storage_path(&var).ok_or(ConfigError::NoStoragePath)?,
        };
        let auth = AuthTimeouts {
            init: Duration::from_millis(parse_u64(&var, "BITACORA_INIT_TIMEOUT_MS", DEFAULT_INIT_TIMEOUT_MS)),
            login: Duration::from_millis(parse_u64(&var, "BITACORA_LOGIN_TIMEOUT_MS", DEFAULT_LOGIN_TIMEOUT_MS)),
        };
        let http = HttpTimeouts {
            connect_secs: parse_u64(&var, "BITACORA_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            request_secs: parse_u64(&var, "BITACORA_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
        };
        Ok(Self { api_url, storage_path, auth, http })
    }
}

/// Validate and normalize a backend origin (trailing `/` trimmed).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidApiUrl`] unless the URL is http(s).
pub fn parse_api_url(raw: Option<&str>) -> Result<String, ConfigError> {
    let raw = raw.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(DEFAULT_API_URL);
    let url = raw.trim_end_matches('/');
    let host = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    match host {
        Some(host) if !host.is_empty() => Ok(url.to_owned()),
        _ => Err(ConfigError::InvalidApiUrl(raw.to_owned())),
    }
}

fn parse_u64(var: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    var(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn default_storage_path(var: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    let base = var("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            var("HOME")
                .filter(|v| !v.is_empty())
                .map(|home| PathBuf::from(home).join(".config"))
        })?;
    Some(base.join("bitacora").join("storage.json"))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
