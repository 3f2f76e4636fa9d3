//! Chat message model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::util::unix_timestamp_millis_now;

/// A unique identifier for a message, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Create a new unique message ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The author of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Session/user identifier issued by the identity provider
    pub id: String,
    /// Name shown next to the author's messages
    pub display_name: String,
    /// Avatar image URL
    pub avatar_url: String,
}

impl Author {
    /// Create an author record
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_url: avatar_url.into(),
        }
    }
}

/// A geographic coordinate attached to a message
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A message in the conversation
///
/// A message carries at least one of `text`, `image`, or `location`;
/// `has_content` checks that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier, generated at construction
    pub id: MessageId,
    /// Message body (may be empty when an attachment is present)
    pub text: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Who sent the message
    pub author: Author,
    /// Optional image attachment URI
    #[serde(default)]
    pub image: Option<String>,
    /// Optional map location attachment
    #[serde(default)]
    pub location: Option<Location>,
}

impl Message {
    /// Create a new text message from the given author
    #[must_use]
    pub fn new_text(author: Author, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            text: text.into(),
            created_at: unix_timestamp_millis_now(),
            author,
            image: None,
            location: None,
        }
    }

    /// Create a new image message (empty text) from the given author
    #[must_use]
    pub fn new_image(author: Author, image_uri: impl Into<String>) -> Self {
        let mut message = Self::new_text(author, "");
        message.image = Some(image_uri.into());
        message
    }

    /// Create a new location message (empty text) from the given author
    #[must_use]
    pub fn new_location(author: Author, location: Location) -> Self {
        let mut message = Self::new_text(author, "");
        message.location = Some(location);
        message
    }

    /// Attach an image URI
    #[must_use]
    pub fn with_image(mut self, image_uri: impl Into<String>) -> Self {
        self.image = Some(image_uri.into());
        self
    }

    /// Attach a map location
    #[must_use]
    pub const fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Check that the message carries text, an image, or a location
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty() || self.image.is_some() || self.location.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> Author {
        Author::new("user-1", "Robin", "https://example.com/avatar.png")
    }

    #[test]
    fn test_message_id_unique() {
        let id1 = MessageId::new();
        let id2 = MessageId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_message_id_parse() {
        let id = MessageId::new();
        let parsed: MessageId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_new_text() {
        let message = Message::new_text(author(), "Hello world");
        assert_eq!(message.text, "Hello world");
        assert!(message.created_at > 0);
        assert!(message.image.is_none());
        assert!(message.location.is_none());
        assert!(message.has_content());
    }

    #[test]
    fn test_attachment_only_messages_have_content() {
        let with_image = Message::new_image(author(), "https://example.com/photo.jpg");
        assert!(with_image.has_content());

        let with_location = Message::new_location(author(), Location::new(52.52, 13.405));
        assert!(with_location.has_content());
    }

    #[test]
    fn test_whitespace_text_is_not_content() {
        let message = Message::new_text(author(), "   ");
        assert!(!message.has_content());
    }

    #[test]
    fn test_builder_attachments() {
        let message = Message::new_text(author(), "Look at this")
            .with_image("https://example.com/photo.jpg")
            .with_location(Location::new(40.7, -74.0));
        assert_eq!(message.image.as_deref(), Some("https://example.com/photo.jpg"));
        assert_eq!(message.location, Some(Location::new(40.7, -74.0)));
    }

    #[test]
    fn test_serde_defaults_optional_attachments() {
        let payload = format!(
            r#"{{
                "id": "{}",
                "text": "hi",
                "created_at": 1700000000000,
                "author": {{"id": "u", "display_name": "N", "avatar_url": ""}}
            }}"#,
            MessageId::new()
        );
        let message: Message = serde_json::from_str(&payload).unwrap();
        assert!(message.image.is_none());
        assert!(message.location.is_none());
    }
}
