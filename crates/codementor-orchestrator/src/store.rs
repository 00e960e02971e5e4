//! Session storage.
//!
//! The orchestrator reaches sessions only through the [`SessionStore`] trait,
//! so the in-memory table can be swapped for a persistent backend. Each
//! session sits behind its own async mutex; holding that lock serializes all
//! operations on one session while other sessions proceed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::session::Session;

/// Shared, lockable handle to one session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Result of looking up a session id.
#[derive(Debug, Clone)]
pub enum SessionLookup {
    /// The session exists.
    Found(SessionHandle),
    /// No session has this id.
    NotFound,
}

/// Storage for session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Looks up a session by id.
    async fn lookup(&self, session_id: &str) -> SessionLookup;

    /// Inserts `session` unless one with the same id already exists.
    ///
    /// Always returns the handle that ends up stored, so two racing creators
    /// share one session.
    async fn get_or_insert(&self, session: Session) -> SessionHandle;

    /// Number of stored sessions.
    async fn count(&self) -> usize;
}

/// Process-lifetime, in-memory session table.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn lookup(&self, session_id: &str) -> SessionLookup {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .map_or(SessionLookup::NotFound, SessionLookup::Found)
    }

    async fn get_or_insert(&self, session: Session) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(session.session_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(session))),
        )
    }

    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
