//! # Session Registry
//!
//! Shared map of live sessions keyed by correlation id.
//!
//! Lookup-or-create is atomic under a single map-level lock, so two
//! concurrent deliveries can never create two sessions for the same id.
//! Each session sits behind its own `Mutex`; mutations to one session
//! are serialized without blocking the rest of the registry. Teardown
//! removes the entry and lets the last holder drop the session.

use crate::error::{Result, VaspError};
use crate::model::{SessionId, VaspInfo};
use crate::session::Session;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Handle to one registered session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Thread-safe store of live sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    /// Sessions idle longer than this are eligible for the sweeper.
    session_ttl: Duration,
}

struct RegistryInner {
    sessions: HashMap<SessionId, SessionHandle>,
    total_created: u64,
}

impl SessionRegistry {
    /// Create a registry; `session_ttl` bounds how long an idle session
    /// survives before [`purge_idle`](Self::purge_idle) collects it.
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                sessions: HashMap::new(),
                total_created: 0,
            })),
            session_ttl,
        }
    }

    /// Look up an existing session.
    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.inner.lock().await.sessions.get(id).cloned()
    }

    /// Look up an existing session, creating it when absent.
    ///
    /// Creation happens under the map lock, so concurrent callers for
    /// the same id observe a single session.
    pub async fn get_or_create(&self, id: &SessionId, own_info: &VaspInfo) -> SessionHandle {
        let mut inner = self.inner.lock().await;
        if let Some(handle) = inner.sessions.get(id) {
            return handle.clone();
        }
        let handle = Arc::new(Mutex::new(Session::new(id.clone(), own_info.clone())));
        inner.sessions.insert(id.clone(), handle.clone());
        inner.total_created += 1;
        debug!(session = %id, "session created");
        handle
    }

    /// Look up a session that must already exist.
    ///
    /// # Errors
    /// Returns [`VaspError::SessionNotFound`] for an unknown id — the
    /// distinct protocol-error kind for a non-handshake message arriving
    /// without a session.
    pub async fn require(&self, id: &SessionId) -> Result<SessionHandle> {
        self.get(id)
            .await
            .ok_or_else(|| VaspError::SessionNotFound(id.to_string()))
    }

    /// Drop a session from the registry. In-flight holders of the
    /// handle finish undisturbed; the entry is simply unreachable for
    /// new messages.
    pub async fn remove(&self, id: &SessionId) {
        if self.inner.lock().await.sessions.remove(id).is_some() {
            debug!(session = %id, "session removed");
        }
    }

    /// Collect sessions idle past the registry TTL. Returns how many
    /// entries were dropped.
    pub async fn purge_idle(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let ttl = self.session_ttl;
        let mut expired = Vec::new();
        for (id, handle) in &inner.sessions {
            // A locked session is in active dispatch; skip it this sweep.
            if let Ok(session) = handle.try_lock() {
                if session.idle_for() > ttl {
                    expired.push(id.clone());
                }
            }
        }
        for id in &expired {
            inner.sessions.remove(id);
            debug!(session = %id, "idle session purged");
        }
        expired.len()
    }

    /// Current registry statistics.
    pub async fn stats(&self) -> RegistryStats {
        let inner = self.inner.lock().await;
        RegistryStats {
            live_sessions: inner.sessions.len(),
            total_created: inner.total_created,
        }
    }
}

/// Statistics about the session registry.
#[derive(Debug, Clone, Copy)]
pub struct RegistryStats {
    pub live_sessions: usize,
    pub total_created: u64,
}
