//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default backend base URL (the FastAPI service's `/api/v1` prefix).
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend API, including the version prefix.
    pub api_url: String,
    /// Bearer token sent on every request, if any.
    pub auth_token: Option<SecretString>,
    /// Partition key for the local cache.
    pub user_id: String,
    /// Path of the local libSQL cache file.
    pub cache_path: PathBuf,
    /// Per-request timeout.
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            auth_token: None,
            user_id: "default".to_string(),
            cache_path: PathBuf::from("./data/youcanfi-cache.db"),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Build configuration from `YCF_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = std::env::var("YCF_API_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "YCF_API_URL".into(),
                message: format!("expected an http(s) URL, got '{api_url}'"),
            });
        }

        let auth_token = std::env::var("YCF_AUTH_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from);

        let user_id = std::env::var("YCF_USER_ID")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.user_id);

        let cache_path = std::env::var("YCF_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_path);

        let http_timeout = match std::env::var("YCF_HTTP_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                    key: "YCF_HTTP_TIMEOUT_SECS".into(),
                    message: format!("{e}"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "YCF_HTTP_TIMEOUT_SECS".into(),
                        message: "must be greater than zero".into(),
                    });
                }
                Duration::from_secs(secs)
            }
            Err(_) => defaults.http_timeout,
        };

        Ok(Self {
            api_url,
            auth_token,
            user_id,
            cache_path,
            http_timeout,
        })
    }

    /// Set the API base URL (builder style, mainly for tests).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the bearer token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(SecretString::from(token.into()));
        self
    }

    /// Set the cache partition key.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }
}
