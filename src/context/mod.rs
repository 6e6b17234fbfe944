//! Per-run invocation context.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::RunConfig;
use crate::plugin::{CallbackContext, PluginManager};
use crate::session::SessionService;
use crate::types::Event;

/// Callback used to stream events to the driving runner.
pub type EventSink = Arc<dyn Fn(Event) + Send + Sync>;

/// One top-level run of an agent, shared down the delegation tree.
///
/// Child contexts derived via [`child`](Self::child) keep the same
/// invocation identifier but carry an independent history buffer, so a
/// delegated branch can diverge without mutating its siblings.
pub struct InvocationContext {
    pub invocation_id: String,
    pub session_id: String,
    pub user_id: String,
    pub app_name: String,
    /// Delegation path, e.g. `root.worker_2`.
    pub branch: String,
    /// Ordered turn history for this branch.
    pub history: Vec<Event>,
    pub config: RunConfig,
    pub plugins: Arc<PluginManager>,
    pub session: Arc<dyn SessionService>,
    sink: Option<EventSink>,
}

impl InvocationContext {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        app_name: impl Into<String>,
        root_agent: impl Into<String>,
        config: RunConfig,
        plugins: Arc<PluginManager>,
        session: Arc<dyn SessionService>,
    ) -> Self {
        Self {
            invocation_id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            app_name: app_name.into(),
            branch: root_agent.into(),
            history: Vec::new(),
            config,
            plugins,
            session,
            sink: None,
        }
    }

    /// Attach the event sink used to stream events upward.
    pub fn with_sink(mut self, sink: EventSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Derive a context for a delegated child agent. Same invocation id,
    /// copied history, extended branch.
    pub fn child(&self, agent_name: &str) -> Self {
        Self {
            invocation_id: self.invocation_id.clone(),
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            app_name: self.app_name.clone(),
            branch: format!("{}.{agent_name}", self.branch),
            history: self.history.clone(),
            config: self.config.clone(),
            plugins: self.plugins.clone(),
            session: self.session.clone(),
            sink: self.sink.clone(),
        }
    }

    /// Forward an event to the sink without touching history. Used for
    /// partial deltas and for events already appended elsewhere.
    pub fn emit(&self, event: Event) {
        if let Some(ref sink) = self.sink {
            sink(event);
        }
    }

    /// Append a completed event to this branch's history and stream it.
    pub fn append(&mut self, event: Event) {
        self.emit(event.clone());
        self.history.push(event);
    }

    /// Record an event already streamed by a child branch without emitting
    /// it a second time.
    pub fn absorb(&mut self, event: Event) {
        self.history.push(event);
    }

    /// Context handed to plugin callbacks for the named agent.
    pub fn callback_context(&self, agent_name: &str) -> CallbackContext {
        CallbackContext {
            invocation_id: self.invocation_id.clone(),
            session_id: self.session_id.clone(),
            agent_name: agent_name.to_string(),
        }
    }
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("invocation_id", &self.invocation_id)
            .field("session_id", &self.session_id)
            .field("branch", &self.branch)
            .field("history_len", &self.history.len())
            .finish()
    }
}
