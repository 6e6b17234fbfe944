//! Ordered plugin registry and callback dispatch.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::{Result, TychoError};
use crate::model::{Model, ModelRequest};
use crate::tools::tool::ToolContext;
use crate::types::{Event, ToolResult};

use super::{CallbackContext, Plugin, PluginCallback};

const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Dispatches one callback across the registered plugins in registration
/// order, stopping at the first plugin that returns a value. A hook error
/// aborts the whole dispatch, named by plugin and callback.
macro_rules! dispatch_chain {
    ($self:ident, $callback:expr, |$plugin:ident| $invoke:expr) => {{
        for $plugin in &$self.plugins {
            match $invoke.await {
                Ok(Some(value)) => {
                    tracing::debug!(
                        plugin = %$plugin.name(),
                        callback = %$callback,
                        "plugin override"
                    );
                    return Ok(Some(value));
                }
                Ok(None) => {}
                Err(err) => {
                    return Err(TychoError::PluginHook {
                        plugin: $plugin.name().to_string(),
                        callback: $callback,
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(None)
    }};
}

/// Holds the ordered plugin list and dispatches named callback events.
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
    close_timeout: Duration,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Override the per-plugin teardown timeout.
    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    /// Register a plugin. Name uniqueness is a hard invariant; a duplicate
    /// is a developer-time misconfiguration.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<()> {
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(TychoError::Configuration(format!(
                "plugin '{}' is already registered",
                plugin.name()
            )));
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// Names of registered plugins, in registration order.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub async fn on_user_message(
        &self,
        ctx: &CallbackContext,
        message: &Event,
    ) -> Result<Option<Event>> {
        dispatch_chain!(self, PluginCallback::UserMessage, |plugin| plugin
            .on_user_message(ctx, message))
    }

    pub async fn before_run(&self, ctx: &CallbackContext) -> Result<Option<Event>> {
        dispatch_chain!(self, PluginCallback::BeforeRun, |plugin| plugin
            .before_run(ctx))
    }

    pub async fn after_run(&self, ctx: &CallbackContext) -> Result<Option<Event>> {
        dispatch_chain!(self, PluginCallback::AfterRun, |plugin| plugin
            .after_run(ctx))
    }

    pub async fn on_event(&self, ctx: &CallbackContext, event: &Event) -> Result<Option<Event>> {
        dispatch_chain!(self, PluginCallback::OnEvent, |plugin| plugin
            .on_event(ctx, event))
    }

    pub async fn before_agent(&self, ctx: &CallbackContext) -> Result<Option<Event>> {
        dispatch_chain!(self, PluginCallback::BeforeAgent, |plugin| plugin
            .before_agent(ctx))
    }

    pub async fn after_agent(
        &self,
        ctx: &CallbackContext,
        output: &Event,
    ) -> Result<Option<Event>> {
        dispatch_chain!(self, PluginCallback::AfterAgent, |plugin| plugin
            .after_agent(ctx, output))
    }

    pub async fn before_model(
        &self,
        ctx: &CallbackContext,
        request: &ModelRequest,
    ) -> Result<Option<Event>> {
        dispatch_chain!(self, PluginCallback::BeforeModel, |plugin| plugin
            .before_model(ctx, request))
    }

    pub async fn after_model(
        &self,
        ctx: &CallbackContext,
        response: &Event,
    ) -> Result<Option<Event>> {
        dispatch_chain!(self, PluginCallback::AfterModel, |plugin| plugin
            .after_model(ctx, response))
    }

    pub async fn on_model_error(
        &self,
        ctx: &CallbackContext,
        model: &Arc<dyn Model>,
        request: &ModelRequest,
        error: &TychoError,
    ) -> Result<Option<Event>> {
        dispatch_chain!(self, PluginCallback::OnModelError, |plugin| plugin
            .on_model_error(ctx, model, request, error))
    }

    pub async fn before_tool(
        &self,
        ctx: &ToolContext,
        args: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>> {
        dispatch_chain!(self, PluginCallback::BeforeTool, |plugin| plugin
            .before_tool(ctx, args))
    }

    pub async fn after_tool(
        &self,
        ctx: &ToolContext,
        args: &serde_json::Value,
        result: &ToolResult,
    ) -> Result<Option<serde_json::Value>> {
        dispatch_chain!(self, PluginCallback::AfterTool, |plugin| plugin
            .after_tool(ctx, args, result))
    }

    pub async fn on_tool_error(
        &self,
        ctx: &ToolContext,
        args: &serde_json::Value,
        error: &TychoError,
    ) -> Result<Option<serde_json::Value>> {
        dispatch_chain!(self, PluginCallback::OnToolError, |plugin| plugin
            .on_tool_error(ctx, args, error))
    }

    /// Tear down every plugin under an individual timeout.
    ///
    /// Failures are collected per plugin and reported together so one
    /// misbehaving plugin cannot block shutdown of the others.
    pub async fn close(&self) -> Result<()> {
        let mut failures = Vec::new();
        for plugin in &self.plugins {
            match timeout(self.close_timeout, plugin.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => failures.push(format!("{}: {err}", plugin.name())),
                Err(_) => failures.push(format!(
                    "{}: close timed out after {:?}",
                    plugin.name(),
                    self.close_timeout
                )),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TychoError::PluginShutdown { failures })
        }
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.plugin_names())
            .finish()
    }
}
