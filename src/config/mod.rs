//! Run configuration.

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Default bound on `Thinking` cycles per invocation.
pub const DEFAULT_MAX_TOOL_EXECUTION_STEPS: usize = 20;

/// Settings controlling one invocation.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct RunConfig {
    /// Deadman bound on model-call cycles; exceeding it is fatal.
    #[builder(default = DEFAULT_MAX_TOOL_EXECUTION_STEPS)]
    pub max_tool_execution_steps: usize,
    /// Whether partial (streaming) events are forwarded to the caller.
    #[builder(default = true)]
    pub save_partial_events: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_tool_execution_steps: DEFAULT_MAX_TOOL_EXECUTION_STEPS,
            save_partial_events: true,
        }
    }
}
