//! One-shot network reachability probe.

use reqwest::Client;

use crate::error::{Error, Result};
use crate::util::is_http_url;

/// Result of a reachability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStatus {
    pub reachable: bool,
}

/// Capability to check network reachability once, at activation
///
/// No polling: the answer is a point-in-time reading and callers decide
/// its lifetime.
#[allow(async_fn_in_trait)]
pub trait ConnectivityProbe {
    async fn status(&self) -> Result<ProbeStatus>;
}

/// HTTP implementation probing a configured health endpoint
#[derive(Clone)]
pub struct HttpConnectivityProbe {
    url: String,
    client: Client,
}

impl HttpConnectivityProbe {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into().trim().to_string();
        if !is_http_url(&url) {
            return Err(Error::InvalidInput(
                "Probe URL must include http:// or https://".to_string(),
            ));
        }
        Ok(Self {
            url,
            client: Client::builder().build()?,
        })
    }
}

impl ConnectivityProbe for HttpConnectivityProbe {
    async fn status(&self) -> Result<ProbeStatus> {
        let response = self.client.get(&self.url).send().await?;
        Ok(ProbeStatus {
            reachable: response.status().is_success(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_non_http_url() {
        assert!(HttpConnectivityProbe::new("health.example.com").is_err());
        assert!(HttpConnectivityProbe::new("   ").is_err());
    }

    #[test]
    fn new_accepts_http_url() {
        assert!(HttpConnectivityProbe::new("https://api.example.com/v1/health").is_ok());
    }
}
