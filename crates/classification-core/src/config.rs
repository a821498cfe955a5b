//! Client configuration.
//!
//! Holds the OAuth client credentials, the callback endpoint, the portal
//! URLs and the location of the saved token. Configuration is read from
//! `~/.config/classification-portal/config.json` when present, and the
//! client credentials can be overridden through the environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::CallbackEndpoint;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "classification-portal";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Saved token file name
const TOKEN_FILE: &str = "saved_token.json";

pub const AUTHORIZE_URL: &str = "https://auth.fit.cvut.cz/oauth/authorize";
pub const TOKEN_URL: &str = "https://auth.fit.cvut.cz/oauth/token";
pub const API_URL: &str = "https://rozvoj.fit.cvut.cz/evolution-dev/classification-dev/api/v1";

pub const CLIENT_ID_ENV: &str = "CLASSIFICATION_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "CLASSIFICATION_CLIENT_SECRET";

/// Seconds to wait for the login redirect.
const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_host: String,
    pub callback_port: u16,
    pub authorize_url: String,
    pub token_url: String,
    pub api_url: String,
    pub token_path: Option<PathBuf>,
    /// `None` waits for the login redirect indefinitely.
    pub callback_timeout_secs: Option<u64>,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            callback_host: "localhost".to_string(),
            callback_port: 8080,
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            api_url: API_URL.to_string(),
            token_path: None,
            callback_timeout_secs: Some(DEFAULT_CALLBACK_TIMEOUT_SECS),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("callback_host", &self.callback_host)
            .field("callback_port", &self.callback_port)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("api_url", &self.api_url)
            .field("token_path", &self.token_path)
            .field("callback_timeout_secs", &self.callback_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    /// Load the user config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Override the client credentials from `lookup` (normally the process environment)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(CLIENT_ID_ENV).filter(|v| !v.is_empty()) {
            self.client_id = id;
        }
        if let Some(secret) = lookup(CLIENT_SECRET_ENV).filter(|v| !v.is_empty()) {
            self.client_secret = secret;
        }
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where the token is saved: the configured path, else the user cache
    /// directory, else the working directory.
    pub fn resolved_token_path(&self) -> PathBuf {
        if let Some(ref path) = self.token_path {
            return path.clone();
        }
        dirs::cache_dir()
            .map(|dir| dir.join(APP_NAME).join(TOKEN_FILE))
            .unwrap_or_else(|| PathBuf::from(TOKEN_FILE))
    }

    pub fn callback(&self) -> CallbackEndpoint {
        CallbackEndpoint::new(self.callback_host.clone(), self.callback_port)
    }

    pub fn callback_timeout(&self) -> Option<Duration> {
        self.callback_timeout_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("id", "secret");
        assert_eq!(config.callback().redirect_uri(), "http://localhost:8080");
        assert_eq!(config.token_url, TOKEN_URL);
        assert_eq!(config.callback_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_debug_hides_client_secret() {
        let config = ClientConfig::new("visible-id", "hidden-secret");
        let printed = format!("{config:?}");
        assert!(printed.contains("visible-id"));
        assert!(!printed.contains("hidden-secret"));
    }

    #[test]
    fn test_load_from_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"client_id": "abc", "callback_port": 9000, "callback_timeout_secs": null, "token_path": "/tmp/tok.json"}"#,
        )
        .unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.client_id, "abc");
        assert_eq!(config.callback_port, 9000);
        assert_eq!(config.callback_host, "localhost");
        assert_eq!(config.callback_timeout(), None);
        assert_eq!(config.resolved_token_path(), PathBuf::from("/tmp/tok.json"));
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(ClientConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides_credentials() {
        let mut config = ClientConfig::new("file-id", "file-secret");
        config.apply_env(|key| match key {
            CLIENT_ID_ENV => Some("env-id".to_string()),
            CLIENT_SECRET_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.client_id, "env-id");
        assert_eq!(config.client_secret, "file-secret");
    }
}
