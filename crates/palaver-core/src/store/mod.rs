//! Remote message store: wire records, subscription handle, store trait

mod http;

pub use http::HttpMessageStore;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::models::{Author, Location, Message, MessageId};

/// Wire shape of a message in the remote store.
///
/// All fields are optional at the boundary; conversion to [`Message`]
/// validates the record and rejects malformed ones instead of letting
/// undefined shapes propagate. Unknown extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub author: Option<AuthorRecord>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub location: Option<LocationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub latitude: f64,
    pub longitude: f64,
}

impl TryFrom<MessageRecord> for Message {
    type Error = Error;

    fn try_from(record: MessageRecord) -> Result<Self> {
        let id: MessageId = record
            .id
            .as_deref()
            .ok_or_else(|| Error::InvalidRecord("missing id".to_string()))?
            .parse()
            .map_err(|_| Error::InvalidRecord("unparsable id".to_string()))?;

        let created_at = record
            .created_at
            .ok_or_else(|| Error::InvalidRecord("missing created_at".to_string()))?;

        let author = record
            .author
            .ok_or_else(|| Error::InvalidRecord("missing author".to_string()))?;

        let message = Self {
            id,
            text: record.text.unwrap_or_default(),
            created_at,
            author: Author {
                id: author.id,
                display_name: author.display_name.unwrap_or_default(),
                avatar_url: author.avatar_url.unwrap_or_default(),
            },
            image: record.image,
            location: record.location.map(|location| Location {
                latitude: location.latitude,
                longitude: location.longitude,
            }),
        };

        if !message.has_content() {
            return Err(Error::InvalidRecord(
                "record carries neither text nor attachment".to_string(),
            ));
        }

        Ok(message)
    }
}

impl From<&Message> for MessageRecord {
    fn from(message: &Message) -> Self {
        Self {
            id: Some(message.id.as_str()),
            text: Some(message.text.clone()),
            created_at: Some(message.created_at),
            author: Some(AuthorRecord {
                id: message.author.id.clone(),
                display_name: Some(message.author.display_name.clone()),
                avatar_url: Some(message.author.avatar_url.clone()),
            }),
            image: message.image.clone(),
            location: message.location.map(|location| LocationRecord {
                latitude: location.latitude,
                longitude: location.longitude,
            }),
        }
    }
}

/// A live subscription to the remote message collection.
///
/// Each received item is a full replacement snapshot, newest-first.
/// Closing (or dropping) the handle releases the underlying delivery task;
/// there is no re-subscription on drop.
pub struct Subscription {
    receiver: mpsc::Receiver<Vec<MessageRecord>>,
    delivery_task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a snapshot channel with no owned delivery task (used by tests
    /// and by stores that manage delivery elsewhere)
    #[must_use]
    pub const fn new(receiver: mpsc::Receiver<Vec<MessageRecord>>) -> Self {
        Self {
            receiver,
            delivery_task: None,
        }
    }

    /// Wrap a snapshot channel together with the task that feeds it
    #[must_use]
    pub const fn with_delivery_task(
        receiver: mpsc::Receiver<Vec<MessageRecord>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            receiver,
            delivery_task: Some(task),
        }
    }

    /// Wait for the next snapshot; `None` once the subscription has closed
    pub async fn next_snapshot(&mut self) -> Option<Vec<MessageRecord>> {
        self.receiver.recv().await
    }

    /// Release the delivery task. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(task) = self.delivery_task.take() {
            task.abort();
            tracing::debug!("Message subscription closed");
        }
        self.receiver.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Trait for the remote message collection
#[allow(async_fn_in_trait)]
pub trait MessageStore {
    /// Append one message record to the collection
    async fn append(&self, message: &Message) -> Result<()>;

    /// Open a snapshot subscription, newest-first by creation time
    async fn subscribe(&self) -> Result<Subscription>;
}
