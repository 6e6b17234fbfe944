//! Convenience re-exports for the common surface.
//!
//! ```
//! use tycho::prelude::*;
//! ```

pub use crate::agents::{
    Agent, ContinuePredicate, LlmAgent, LoopAgent, ParallelAgent, SequentialAgent,
};
pub use crate::config::RunConfig;
pub use crate::context::InvocationContext;
pub use crate::error::{Result, TychoError};
pub use crate::model::{FragmentStream, Model, ModelRequest, ToolDeclaration};
pub use crate::plugin::{
    ExhaustedBehavior, ModelFallbackPlugin, Plugin, PluginManager, ReflectAndRetryToolPlugin,
    RetryScope,
};
pub use crate::runner::Runner;
pub use crate::session::{InMemorySessionService, SessionService};
pub use crate::streaming::StreamAccumulator;
pub use crate::tools::{FnTool, Tool, ToolContext, ToolExecutor};
pub use crate::types::{
    Author, ContentPart, Event, ResponseFragment, ToolCall, ToolCallDelta, ToolResult,
};
