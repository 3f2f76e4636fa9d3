//! Local cache database layer for Palaver

mod connection;
mod migrations;
mod snapshot_repository;

pub use connection::Database;
pub use snapshot_repository::{
    LibSqlSnapshotRepository, SharedSnapshotRepository, SnapshotRepository, MESSAGES_CACHE_KEY,
};
