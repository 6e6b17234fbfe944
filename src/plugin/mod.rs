//! Plugin interception system.
//!
//! Plugins observe and override every phase of execution through a closed
//! set of named callbacks. Each callback has a default no-op implementation,
//! so a plugin implements only the hooks it cares about and the
//! [`PluginManager`] can dispatch uniformly without existence checks.

pub mod manager;
pub mod model_fallback;
pub mod reflect_retry;

use std::sync::Arc;

use async_trait::async_trait;
use strum::Display;

use crate::error::{Result, TychoError};
use crate::model::{Model, ModelRequest};
use crate::tools::tool::ToolContext;
use crate::types::{Event, ToolResult};

pub use manager::PluginManager;
pub use model_fallback::ModelFallbackPlugin;
pub use reflect_retry::{ExhaustedBehavior, ReflectAndRetryToolPlugin, RetryScope};

/// Closed enumeration of interception points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PluginCallback {
    UserMessage,
    BeforeRun,
    AfterRun,
    OnEvent,
    BeforeAgent,
    AfterAgent,
    BeforeModel,
    AfterModel,
    OnModelError,
    BeforeTool,
    AfterTool,
    OnToolError,
}

/// Context passed to run/agent/model-level callbacks.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    pub invocation_id: String,
    pub session_id: String,
    pub agent_name: String,
}

/// A cross-cutting policy that hooks into runtime phases.
///
/// Every hook returns `Ok(None)` to decline (proceed with default behavior)
/// or `Ok(Some(value))` to override; an `Err` is a fatal
/// [`TychoError::PluginHook`] once the manager names the plugin and phase.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name; duplicate registration is rejected.
    fn name(&self) -> &str;

    /// The initial user message; `Some` replaces it.
    async fn on_user_message(
        &self,
        _ctx: &CallbackContext,
        _message: &Event,
    ) -> Result<Option<Event>> {
        Ok(None)
    }

    /// Before the root agent runs; `Some` short-circuits the entire run.
    async fn before_run(&self, _ctx: &CallbackContext) -> Result<Option<Event>> {
        Ok(None)
    }

    /// After the run completes. Observation point; the returned value only
    /// stops later plugins in the chain.
    async fn after_run(&self, _ctx: &CallbackContext) -> Result<Option<Event>> {
        Ok(None)
    }

    /// Every event yielded to the caller; `Some` replaces the event.
    async fn on_event(&self, _ctx: &CallbackContext, _event: &Event) -> Result<Option<Event>> {
        Ok(None)
    }

    /// Before an agent (root or child) runs; `Some` becomes its output and
    /// the agent is skipped.
    async fn before_agent(&self, _ctx: &CallbackContext) -> Result<Option<Event>> {
        Ok(None)
    }

    /// After an agent produced its final event; `Some` replaces it.
    async fn after_agent(&self, _ctx: &CallbackContext, _output: &Event) -> Result<Option<Event>> {
        Ok(None)
    }

    /// Before each model call; `Some` is used as the model response and the
    /// call is skipped.
    async fn before_model(
        &self,
        _ctx: &CallbackContext,
        _request: &ModelRequest,
    ) -> Result<Option<Event>> {
        Ok(None)
    }

    /// After each model response; `Some` replaces the response.
    async fn after_model(
        &self,
        _ctx: &CallbackContext,
        _response: &Event,
    ) -> Result<Option<Event>> {
        Ok(None)
    }

    /// A model call failed; `Some` substitutes a response, `None` lets the
    /// error propagate.
    async fn on_model_error(
        &self,
        _ctx: &CallbackContext,
        _model: &Arc<dyn Model>,
        _request: &ModelRequest,
        _error: &TychoError,
    ) -> Result<Option<Event>> {
        Ok(None)
    }

    /// Before each tool call; `Some` replaces the call entirely (the tool is
    /// not invoked).
    async fn before_tool(
        &self,
        _ctx: &ToolContext,
        _args: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    /// After each tool result; `Some` rewrites the result value.
    async fn after_tool(
        &self,
        _ctx: &ToolContext,
        _args: &serde_json::Value,
        _result: &ToolResult,
    ) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    /// A tool invocation raised; `Some` substitutes a result value, `None`
    /// lets the error propagate.
    async fn on_tool_error(
        &self,
        _ctx: &ToolContext,
        _args: &serde_json::Value,
        _error: &TychoError,
    ) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    /// Optional teardown, run under a timeout at shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
