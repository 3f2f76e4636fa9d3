//! Anonymous-session identity client.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::unix_timestamp_now;

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub expires_at: i64,
    pub user: SessionUser,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Session storage error: {0}")]
    Storage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where the active session is kept between activations.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<Session>>;
    fn save_session(&self, session: &Session) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// In-process session store. Hosts that want sessions to survive a restart
/// supply their own `SessionPersistence` backed by platform storage.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Option<Session>>>,
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> AuthResult<Option<Session>> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slot.clone())
    }

    fn save_session(&self, session: &Session) -> AuthResult<()> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
        Ok(())
    }
}

/// Capability to resolve or mint the device identity.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider {
    /// Return the active unexpired session, if any.
    async fn current_session(&self) -> AuthResult<Option<Session>>;

    /// Mint a fresh anonymous session and make it the active one.
    async fn sign_in_anonymously(&self) -> AuthResult<Session>;
}

#[derive(Clone)]
pub struct HttpAuthClient<S: SessionPersistence> {
    auth_url: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> HttpAuthClient<S> {
    pub fn new(url: impl AsRef<str>, store: S) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        Ok(Self {
            auth_url,
            client: Client::builder().build()?,
            store,
        })
    }
}

impl<S: SessionPersistence> IdentityProvider for HttpAuthClient<S> {
    async fn current_session(&self) -> AuthResult<Option<Session>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if stored_session.is_expired() {
            self.store.clear_session()?;
            return Ok(None);
        }

        Ok(Some(stored_session))
    }

    async fn sign_in_anonymously(&self) -> AuthResult<Session> {
        let request = self
            .client
            .post(format!("{}/v1/auth/anonymous", self.auth_url))
            .header("Accept", "application/json");

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        let payload = response.json::<AnonymousSessionResponse>().await?;
        let session = payload.into_session()?;
        self.store.save_session(&session)?;
        Ok(session)
    }
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Auth URL must not be empty",
        ));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AuthError::InvalidConfiguration(
            "Auth URL must include http:// or https://",
        ));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Deserialize)]
struct AnonymousSessionResponse {
    access_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<AnonymousUser>,
}

#[derive(Debug, Deserialize)]
struct AnonymousUser {
    id: String,
}

impl AnonymousSessionResponse {
    fn into_session(self) -> AuthResult<Session> {
        let access_token = self
            .access_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AuthError::Api("Auth response did not include an access token".to_string())
            })?;

        let expires_at = self
            .expires_at
            .or_else(|| {
                self.expires_in
                    .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
            })
            .ok_or_else(|| {
                AuthError::Api("Auth response did not include expires_at/expires_in".to_string())
            })?;

        let user = self.user.ok_or_else(|| {
            AuthError::Api("Auth response did not include a user record".to_string())
        })?;

        Ok(Session {
            access_token,
            expires_at,
            user: SessionUser { id: user.id },
        })
    }
}

#[derive(Debug, Deserialize)]
struct AuthErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<AuthErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: i64) -> Session {
        Session {
            access_token: "secret-access-token".to_string(),
            expires_at,
            user: SessionUser {
                id: "anon-1".to_string(),
            },
        }
    }

    #[test]
    fn normalize_auth_url_rejects_invalid_values() {
        assert!(normalize_auth_url("").is_err());
        assert!(normalize_auth_url("auth.example.com").is_err());
    }

    #[test]
    fn normalize_auth_url_strips_trailing_slash() {
        let normalized = normalize_auth_url("https://auth.example.com/").unwrap();
        assert_eq!(normalized, "https://auth.example.com");
    }

    #[test]
    fn session_debug_redacts_token() {
        let rendered = format!("{:?}", session(1_700_000_000));
        assert!(!rendered.contains("secret-access-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn response_without_token_is_an_error() {
        let response = AnonymousSessionResponse {
            access_token: None,
            expires_at: Some(1_700_000_000),
            expires_in: None,
            user: Some(AnonymousUser {
                id: "anon-1".to_string(),
            }),
        };
        assert!(response.into_session().is_err());
    }

    #[test]
    fn response_derives_expiry_from_expires_in() {
        let response = AnonymousSessionResponse {
            access_token: Some("token".to_string()),
            expires_at: None,
            expires_in: Some(3600),
            user: Some(AnonymousUser {
                id: "anon-1".to_string(),
            }),
        };
        let session = response.into_session().unwrap();
        assert!(session.expires_at > unix_timestamp_now());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn expired_stored_session_is_cleared() {
        let store = MemorySessionStore::default();
        store.save_session(&session(0)).unwrap();

        let client = HttpAuthClient::new("https://auth.example.com", store.clone()).unwrap();
        let current = client.current_session().await.unwrap();

        assert!(current.is_none());
        assert!(store.load_session().unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unexpired_stored_session_is_reused() {
        let store = MemorySessionStore::default();
        let stored = session(unix_timestamp_now() + 3600);
        store.save_session(&stored).unwrap();

        let client = HttpAuthClient::new("https://auth.example.com", store).unwrap();
        let current = client.current_session().await.unwrap();

        assert_eq!(current, Some(stored));
    }
}
