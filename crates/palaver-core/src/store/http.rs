//! HTTP message store client

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::models::Message;
use crate::util::{compact_text, is_http_url};

use super::{MessageRecord, MessageStore, Subscription};

const SNAPSHOT_CHANNEL_CAPACITY: usize = 8;

/// Default interval between collection polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// JSON REST client for the remote message collection.
///
/// The subscription contract (full ordered snapshots, delivered on change)
/// is realized by polling the collection endpoint on a fixed interval and
/// suppressing consecutive identical payloads.
#[derive(Clone)]
pub struct HttpMessageStore {
    base_url: String,
    client: Client,
    poll_interval: Duration,
}

impl HttpMessageStore {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = base_url.as_ref().trim().trim_end_matches('/').to_string();
        if !is_http_url(&base_url) {
            return Err(Error::InvalidInput(
                "Store base URL must include http:// or https://".to_string(),
            ));
        }
        Ok(Self {
            base_url,
            client: Client::builder().build()?,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Set the interval between collection polls
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn messages_endpoint(&self) -> String {
        format!("{}/v1/messages?order=created_at.desc", self.base_url)
    }

    async fn fetch_collection(client: &Client, endpoint: &str) -> Result<Vec<MessageRecord>> {
        let response = client
            .get(endpoint)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }

        Ok(response.json::<Vec<MessageRecord>>().await?)
    }
}

impl MessageStore for HttpMessageStore {
    async fn append(&self, message: &Message) -> Result<()> {
        let record = MessageRecord::from(message);
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&record)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }

        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription> {
        let endpoint = self.messages_endpoint();

        // The initial fetch doubles as subscription setup: an unreachable
        // collection fails here instead of silently inside the poll task.
        let initial = Self::fetch_collection(&self.client, &endpoint).await?;

        let (sender, receiver) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let client = self.client.clone();
        let poll_interval = self.poll_interval;

        let task = tokio::spawn(async move {
            let mut last_delivered = initial.clone();
            if sender.send(initial).await.is_err() {
                return;
            }

            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // First tick completes immediately

            loop {
                ticker.tick().await;
                match Self::fetch_collection(&client, &endpoint).await {
                    Ok(snapshot) => {
                        if snapshot == last_delivered {
                            continue;
                        }
                        last_delivered = snapshot.clone();
                        if sender.send(snapshot).await.is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        tracing::debug!("Collection poll failed: {error}");
                    }
                }
            }
        });

        Ok(Subscription::with_delivery_task(receiver, task))
    }
}

#[derive(Debug, serde::Deserialize)]
struct StoreErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<StoreErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}
