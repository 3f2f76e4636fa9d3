//! palaver-core - Core library for Palaver
//!
//! This crate contains the chat models, the local snapshot cache, the
//! backend clients (identity, connectivity, message store), and the sync
//! controller that coordinates them for a conversation screen.

pub mod auth;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Author, Location, Message, MessageId};
pub use sync::{ChatState, ConnectionMode, HttpSyncController, SyncController};
