//! Session-append collaborator.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::types::Event;

/// Persists completed events per session. The storage format is the
/// collaborator's business; the runtime only appends and reads back.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Append one completed (non-partial) event to a session.
    async fn append(&self, session_id: &str, event: &Event) -> Result<()>;

    /// All events appended to a session so far.
    async fn events(&self, session_id: &str) -> Result<Vec<Event>>;
}

/// In-memory session store, mostly useful for tests and short-lived runs.
#[derive(Debug, Default)]
pub struct InMemorySessionService {
    sessions: Mutex<HashMap<String, Vec<Event>>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn append(&self, session_id: &str, event: &Event) -> Result<()> {
        self.sessions
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn events(&self, session_id: &str) -> Result<Vec<Event>> {
        Ok(self
            .sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}
