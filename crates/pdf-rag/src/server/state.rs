//! Application state for the HTTP server

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::pipeline::RagContext;
use crate::session::Session;

/// Handle to one session; turns on the same session run one at a time
pub type SessionHandle = Arc<Mutex<Session>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Pipeline resources shared by every session
    context: Arc<RagContext>,
    /// Live sessions, in memory only
    sessions: DashMap<Uuid, SessionEntry>,
}

struct SessionEntry {
    handle: SessionHandle,
    /// Time of the last lookup, readable without the session lock
    last_active: parking_lot::Mutex<Instant>,
}

impl SessionEntry {
    fn new(handle: SessionHandle) -> Self {
        Self {
            handle,
            last_active: parking_lot::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_active.lock().elapsed()
    }
}

impl AppState {
    /// Build the pipeline context named by `config`
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing RAG state (llm: {:?} {}, embeddings: {:?} {})",
            config.llm.endpoint,
            config.llm.model,
            config.embeddings.backend,
            config.embeddings.model
        );
        let context = RagContext::from_config(config)?;
        Ok(Self::from_context(context))
    }

    /// Wrap an already assembled context
    pub fn from_context(context: RagContext) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                context: Arc::new(context),
                sessions: DashMap::new(),
            }),
        }
    }

    pub fn context(&self) -> &RagContext {
        &self.inner.context
    }

    pub fn config(&self) -> &RagConfig {
        self.inner.context.config()
    }

    /// Register a new session and return its handle
    pub fn create_session(&self, credential: Option<Credential>) -> (Uuid, SessionHandle) {
        let session = Session::new(credential);
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));
        self.inner
            .sessions
            .insert(id, SessionEntry::new(Arc::clone(&handle)));
        tracing::info!("Created session {} ({} active)", id, self.inner.sessions.len());
        (id, handle)
    }

    /// Look up a session and mark it active
    pub fn session(&self, id: &Uuid) -> Result<SessionHandle> {
        self.inner
            .sessions
            .get(id)
            .map(|entry| {
                entry.touch();
                Arc::clone(&entry.handle)
            })
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Drop a session together with its index and credential
    pub fn remove_session(&self, id: &Uuid) -> Result<()> {
        self.inner
            .sessions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Drop sessions untouched for longer than `ttl`.
    ///
    /// A session with a turn in flight holds its lock and is kept.
    /// Returns the number of sessions removed.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let before = self.inner.sessions.len();
        self.inner.sessions.retain(|id, entry| {
            let busy = entry.handle.try_lock().is_err();
            let keep = busy || entry.idle_for() <= ttl;
            if !keep {
                tracing::debug!("Evicting idle session {}", id);
            }
            keep
        });
        let evicted = before.saturating_sub(self.inner.sessions.len());
        if evicted > 0 {
            tracing::info!(
                "Evicted {} idle sessions ({} active)",
                evicted,
                self.inner.sessions.len()
            );
        }
        evicted
    }
}
