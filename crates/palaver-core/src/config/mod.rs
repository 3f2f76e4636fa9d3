//! Backend endpoint configuration for client apps.
//!
//! Provides a unified `BackendConfig` struct naming the public endpoints a
//! chat screen needs: the message store API, the identity endpoint, and the
//! reachability probe. Secret credentials must never be stored here.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Default avatar applied to the local identity
pub const DEFAULT_AVATAR_URL: &str = "https://placeimg.com/140/140/any";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

const ENV_API_BASE_URL: &str = "PALAVER_API_BASE_URL";
const ENV_AUTH_BASE_URL: &str = "PALAVER_AUTH_BASE_URL";
const ENV_PROBE_URL: &str = "PALAVER_PROBE_URL";
const ENV_POLL_INTERVAL_SECS: &str = "PALAVER_POLL_INTERVAL_SECS";

/// Public endpoints and tunables required to reach the chat backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Message store API base URL
    pub api_base_url: String,
    /// Identity endpoint base URL
    pub auth_base_url: String,
    /// Health-check URL probed once at activation
    pub probe_url: String,
    /// Interval between collection polls while subscribed
    pub poll_interval: Duration,
    /// Avatar URL applied to the local identity
    pub avatar_url: String,
}

impl BackendConfig {
    /// Create a configuration from explicit endpoints.
    ///
    /// The probe URL defaults to `{api_base_url}/v1/health`.
    pub fn new(api_base_url: impl Into<String>, auth_base_url: impl Into<String>) -> Result<Self> {
        let api_base_url = normalize_required_http_url(api_base_url.into(), "api base URL")?;
        let auth_base_url = normalize_required_http_url(auth_base_url.into(), "auth base URL")?;
        let probe_url = format!("{api_base_url}/v1/health");

        Ok(Self {
            api_base_url,
            auth_base_url,
            probe_url,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            avatar_url: DEFAULT_AVATAR_URL.to_string(),
        })
    }

    /// Override the health-check URL
    pub fn with_probe_url(mut self, probe_url: impl Into<String>) -> Result<Self> {
        self.probe_url = normalize_required_http_url(probe_url.into(), "probe URL")?;
        Ok(self)
    }

    /// Override the collection poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the default avatar URL
    #[must_use]
    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = avatar_url.into();
        self
    }

    /// Resolve configuration from environment variables.
    ///
    /// Returns `Ok(None)` when the API base URL is not set; the auth base
    /// URL falls back to the API base URL when absent.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_values(
            std::env::var(ENV_API_BASE_URL).ok(),
            std::env::var(ENV_AUTH_BASE_URL).ok(),
            std::env::var(ENV_PROBE_URL).ok(),
            std::env::var(ENV_POLL_INTERVAL_SECS).ok(),
        )
    }

    fn from_values(
        api_base_url: Option<String>,
        auth_base_url: Option<String>,
        probe_url: Option<String>,
        poll_interval_secs: Option<String>,
    ) -> Result<Option<Self>> {
        let Some(api_base_url) = normalize_text_option(api_base_url) else {
            return Ok(None);
        };

        let auth_base_url =
            normalize_text_option(auth_base_url).unwrap_or_else(|| api_base_url.clone());
        let mut config = Self::new(api_base_url, auth_base_url)?;

        if let Some(probe_url) = normalize_text_option(probe_url) {
            config = config.with_probe_url(probe_url)?;
        }

        if let Some(raw) = normalize_text_option(poll_interval_secs) {
            let secs: u64 = raw.parse().map_err(|_| {
                Error::InvalidInput(format!("{ENV_POLL_INTERVAL_SECS} must be an integer"))
            })?;
            config = config.with_poll_interval(Duration::from_secs(secs));
        }

        Ok(Some(config))
    }
}

fn normalize_required_http_url(raw: String, field: &str) -> Result<String> {
    let value = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput(format!("{field} must not be empty")))?;
    if is_http_url(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(format!(
            "{field} must include http:// or https://"
        )))
    }
}
