//! Data models for Palaver

mod message;

pub use message::{Author, Location, Message, MessageId};
