//! Error types for Tycho.

use thiserror::Error;

use crate::plugin::PluginCallback;

/// Primary error type for all Tycho operations.
#[derive(Error, Debug)]
pub enum TychoError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Model error ({model}): {message}")]
    Model { model: String, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool execution error in '{tool_name}': {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Plugin '{plugin}' failed in {callback} callback: {message}")]
    PluginHook {
        plugin: String,
        callback: PluginCallback,
        message: String,
    },

    #[error("Plugin shutdown failures: {}", failures.join("; "))]
    PluginShutdown { failures: Vec<String> },

    #[error("Max tool execution steps exceeded (limit {limit})")]
    MaxStepsExceeded { limit: usize },

    #[error("Max loop iterations exceeded (limit {limit})")]
    MaxIterationsExceeded { limit: usize },

    #[error("Agent '{agent}' failed: {message}")]
    Agent { agent: String, message: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl TychoError {
    /// Create a model error.
    pub fn model(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Model {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Create an agent failure naming the offending agent.
    pub fn agent(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Agent {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Whether this is a rate-limit error (drives the fallback cascade).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether this error must abort the run regardless of plugins.
    ///
    /// Deadman-switch conditions and plugin hook failures are never offered
    /// to the recovery path.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PluginHook { .. }
                | Self::MaxStepsExceeded { .. }
                | Self::MaxIterationsExceeded { .. }
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TychoError>;
