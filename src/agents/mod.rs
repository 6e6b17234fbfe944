//! Agents and their composition wrappers.

pub mod llm;
pub mod looping;
pub mod parallel;
pub mod sequential;

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::error::{Result, TychoError};
use crate::types::Event;

pub use llm::LlmAgent;
pub use looping::{ContinuePredicate, LoopAgent};
pub use parallel::ParallelAgent;
pub use sequential::SequentialAgent;

/// An agent produces one final event per run, streaming intermediate events
/// through the context sink.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Drive this agent to completion against the given context.
    async fn run(&self, ctx: &mut InvocationContext) -> Result<Event>;
}

/// Run an agent with `before_agent` / `after_agent` interception.
///
/// A `before_agent` override becomes the agent's output and the agent never
/// runs; an `after_agent` override replaces the final event. Failures are
/// wrapped so they name the offending agent.
pub async fn run_with_hooks(agent: &dyn Agent, ctx: &mut InvocationContext) -> Result<Event> {
    let callback_ctx = ctx.callback_context(agent.name());
    if let Some(event) = ctx.plugins.before_agent(&callback_ctx).await? {
        ctx.emit(event.clone());
        return Ok(event);
    }

    let output = agent.run(ctx).await.map_err(|err| match err {
        // Already attributed, or must keep its deadman/hook identity.
        TychoError::Agent { .. } => err,
        err if err.is_fatal() => err,
        err => TychoError::agent(agent.name(), err.to_string()),
    })?;

    match ctx.plugins.after_agent(&callback_ctx, &output).await? {
        Some(replaced) => {
            ctx.emit(replaced.clone());
            Ok(replaced)
        }
        None => Ok(output),
    }
}
