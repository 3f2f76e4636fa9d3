//! Message synchronization and offline fallback control.
//!
//! `SyncController` owns the in-memory conversation, decides online vs.
//! offline once at activation, mirrors sends to the remote store and the
//! local cache, and replaces state wholesale from subscription snapshots.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::task::JoinHandle;

use crate::auth::{HttpAuthClient, IdentityProvider, MemorySessionStore};
use crate::config::{BackendConfig, DEFAULT_AVATAR_URL};
use crate::connectivity::{ConnectivityProbe, HttpConnectivityProbe};
use crate::db::{Database, SharedSnapshotRepository, SnapshotRepository, MESSAGES_CACHE_KEY};
use crate::error::Result;
use crate::models::{Author, Message};
use crate::store::{HttpMessageStore, MessageRecord, MessageStore, Subscription};

/// Network mode decided once at activation; never re-evaluated afterwards
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Activation has not run yet
    #[default]
    Unknown,
    Online,
    Offline,
}

/// Everything the screen renders, owned exclusively by the controller.
///
/// The presentation layer receives clones of this, never a mutable handle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatState {
    /// Conversation, newest-first
    pub messages: Vec<Message>,
    /// Network mode decided at activation
    pub connection: ConnectionMode,
    /// Local identity established at activation (online only)
    pub identity: Option<Author>,
}

/// Coordinates the conversation view over its four injected capabilities:
/// connectivity probe, identity provider, remote message store, and local
/// snapshot cache.
pub struct SyncController<P, I, S, C>
where
    P: ConnectivityProbe,
    I: IdentityProvider,
    S: MessageStore,
    C: SnapshotRepository,
{
    probe: P,
    identity: I,
    store: S,
    cache: C,
    avatar_url: String,
    state: Arc<RwLock<ChatState>>,
    ingest_task: Option<JoinHandle<()>>,
}

impl<P, I, S, C> SyncController<P, I, S, C>
where
    P: ConnectivityProbe,
    I: IdentityProvider,
    S: MessageStore,
    C: SnapshotRepository,
{
    /// Create a controller over explicitly constructed collaborators
    pub fn new(probe: P, identity: I, store: S, cache: C) -> Self {
        Self {
            probe,
            identity,
            store,
            cache,
            avatar_url: DEFAULT_AVATAR_URL.to_string(),
            state: Arc::new(RwLock::new(ChatState::default())),
            ingest_task: None,
        }
    }

    /// Override the avatar applied to the local identity
    #[must_use]
    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = avatar_url.into();
        self
    }

    /// Snapshot of the current screen state
    pub fn state(&self) -> ChatState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current conversation, newest-first
    pub fn messages(&self) -> Vec<Message> {
        self.state().messages
    }

    /// Network mode decided at activation
    pub fn connection(&self) -> ConnectionMode {
        self.state().connection
    }

    /// Decide online vs. offline and populate initial state.
    ///
    /// Invoked once per controller lifetime; repeated calls are ignored.
    /// The probe runs exactly once: a reachable answer leads to identity
    /// establishment and a remote subscription, anything else (including a
    /// probe failure) leads to the cached history. Failures along the online
    /// path are logged and the controller keeps whatever state resulted;
    /// the mode is never re-evaluated.
    pub async fn activate(&mut self, display_name: &str) {
        if self.connection() != ConnectionMode::Unknown {
            tracing::warn!("Controller already activated, ignoring");
            return;
        }

        let reachable = match self.probe.status().await {
            Ok(status) => status.reachable,
            Err(error) => {
                tracing::warn!("Connectivity probe failed, treating as offline: {error}");
                false
            }
        };

        if reachable {
            self.activate_online(display_name).await;
        } else {
            self.activate_offline().await;
        }
    }

    async fn activate_online(&mut self, display_name: &str) {
        let session = match self.identity.current_session().await {
            Ok(Some(session)) => Some(session),
            Ok(None) => match self.identity.sign_in_anonymously().await {
                Ok(session) => Some(session),
                Err(error) => {
                    tracing::warn!("Anonymous sign-in failed: {error}");
                    None
                }
            },
            Err(error) => {
                tracing::warn!("Session lookup failed: {error}");
                None
            }
        };

        let identity = session.as_ref().map(|session| {
            Author::new(
                session.user.id.clone(),
                display_name,
                self.avatar_url.clone(),
            )
        });

        {
            let mut state = self.write_state();
            state.connection = ConnectionMode::Online;
            state.identity = identity;
            state.messages.clear();
        }

        // Without an identity the screen stays online but unsubscribed,
        // matching the send-path policy of never special-casing failures.
        let Some(session) = session else {
            return;
        };

        let subscription = self.store.subscribe().await;
        match subscription {
            Ok(subscription) => {
                tracing::debug!(user = %session.user.id, "Subscribed to message collection");
                self.spawn_ingest(subscription);
            }
            Err(error) => {
                tracing::warn!("Subscription setup failed: {error}");
            }
        }
    }

    async fn activate_offline(&self) {
        let cached = match self.cache.load(MESSAGES_CACHE_KEY).await {
            Ok(Some(payload)) => decode_cached_history(&payload),
            Ok(None) => Vec::new(),
            Err(error) => {
                tracing::warn!("Cache read failed: {error}");
                Vec::new()
            }
        };

        let mut state = self.write_state();
        state.connection = ConnectionMode::Offline;
        state.messages = cached;
    }

    fn spawn_ingest(&mut self, mut subscription: Subscription) {
        let state = Arc::clone(&self.state);
        self.ingest_task = Some(tokio::spawn(async move {
            while let Some(records) = subscription.next_snapshot().await {
                let messages = map_snapshot(records);
                let mut guard = state.write().unwrap_or_else(PoisonError::into_inner);
                guard.messages = messages;
            }
        }));
    }

    /// Prepend the batch to the conversation, then mirror it out.
    ///
    /// The optimistic prepend completes before any I/O starts and is never
    /// rolled back. Only the newest message of a batch is appended remotely;
    /// the cache write covers the full updated history. Persistence failures
    /// are logged and swallowed, regardless of connection mode.
    pub async fn send(&self, batch: Vec<Message>) {
        let Some(latest) = batch.last().cloned() else {
            return;
        };

        let history = {
            let mut state = self.write_state();
            for message in batch {
                state.messages.insert(0, message);
            }
            state.messages.clone()
        };

        if let Err(error) = self.store.append(&latest).await {
            tracing::warn!("Remote append failed: {error}");
        }

        match serde_json::to_string(&history) {
            Ok(payload) => {
                if let Err(error) = self.cache.save(MESSAGES_CACHE_KEY, &payload).await {
                    tracing::warn!("Cache write failed: {error}");
                }
            }
            Err(error) => {
                tracing::warn!("Failed to encode history for caching: {error}");
            }
        }
    }

    /// Drop the cached history and reset the conversation to empty
    pub async fn clear_cached_history(&self) {
        if let Err(error) = self.cache.clear(MESSAGES_CACHE_KEY).await {
            tracing::warn!("Cache clear failed: {error}");
        }
        self.write_state().messages.clear();
    }

    /// Release the subscription and its ingestion task.
    ///
    /// Safe to call more than once; also runs on drop.
    pub fn deactivate(&mut self) {
        if let Some(task) = self.ingest_task.take() {
            task.abort();
            tracing::debug!("Sync controller deactivated");
        }
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ChatState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Controller wired to the HTTP backend stack
pub type HttpSyncController = SyncController<
    HttpConnectivityProbe,
    HttpAuthClient<MemorySessionStore>,
    HttpMessageStore,
    SharedSnapshotRepository,
>;

impl
    SyncController<
        HttpConnectivityProbe,
        HttpAuthClient<MemorySessionStore>,
        HttpMessageStore,
        SharedSnapshotRepository,
    >
{
    /// Assemble the HTTP client stack from a backend configuration and a
    /// local cache database path
    pub async fn from_config(config: &BackendConfig, cache_path: impl AsRef<Path>) -> Result<Self> {
        let probe = HttpConnectivityProbe::new(config.probe_url.clone())?;
        let identity = HttpAuthClient::new(&config.auth_base_url, MemorySessionStore::default())?;
        let store =
            HttpMessageStore::new(&config.api_base_url)?.with_poll_interval(config.poll_interval);
        let cache = SharedSnapshotRepository::new(Database::open(cache_path).await?);

        Ok(Self::new(probe, identity, store, cache).with_avatar_url(config.avatar_url.clone()))
    }
}

impl<P, I, S, C> Drop for SyncController<P, I, S, C>
where
    P: ConnectivityProbe,
    I: IdentityProvider,
    S: MessageStore,
    C: SnapshotRepository,
{
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Map a delivered snapshot to messages, skipping malformed records
fn map_snapshot(records: Vec<MessageRecord>) -> Vec<Message> {
    records
        .into_iter()
        .filter_map(|record| match Message::try_from(record) {
            Ok(message) => Some(message),
            Err(error) => {
                tracing::warn!("Skipping malformed record: {error}");
                None
            }
        })
        .collect()
}

/// Decode a cached history payload, treating corruption as empty
fn decode_cached_history(payload: &str) -> Vec<Message> {
    match serde_json::from_str(payload) {
        Ok(messages) => messages,
        Err(error) => {
            tracing::warn!("Discarding corrupt cached history: {error}");
            Vec::new()
        }
    }
}
