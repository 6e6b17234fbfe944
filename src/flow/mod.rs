//! The core tool-calling loop.

use std::sync::Arc;

use futures::StreamExt;

use crate::context::InvocationContext;
use crate::error::{Result, TychoError};
use crate::model::{Model, ModelRequest};
use crate::plugin::CallbackContext;
use crate::streaming::StreamAccumulator;
use crate::tools::ToolExecutor;
use crate::types::{Author, ContentPart, Event};

/// Drives `Thinking → {ToolCallsPending | Done}` for one agent.
///
/// Each cycle requests a model turn (unless a `before_model` hook overrides
/// it), reassembles the fragment stream, executes any tool calls, appends
/// the results, and loops. A cycle count past
/// `max_tool_execution_steps` is a fatal deadman condition.
pub struct LlmFlow {
    model: Arc<dyn Model>,
    executor: ToolExecutor,
    instruction: Option<String>,
    agent_name: String,
}

impl LlmFlow {
    pub fn new(
        model: Arc<dyn Model>,
        executor: ToolExecutor,
        instruction: Option<String>,
        agent_name: impl Into<String>,
    ) -> Self {
        Self {
            model,
            executor,
            instruction,
            agent_name: agent_name.into(),
        }
    }

    /// Run the loop to completion, appending every completed turn to the
    /// context history. Returns the final (tool-call-free) model event.
    pub async fn run(&self, ctx: &mut InvocationContext) -> Result<Event> {
        let limit = ctx.config.max_tool_execution_steps;
        let callback_ctx = ctx.callback_context(&self.agent_name);
        let mut step = 0usize;

        loop {
            step += 1;
            if step > limit {
                return Err(TychoError::MaxStepsExceeded { limit });
            }
            tracing::debug!(
                invocation_id = %ctx.invocation_id,
                agent = %self.agent_name,
                step,
                "thinking cycle"
            );

            let mut request =
                ModelRequest::new(ctx.history.clone()).with_tools(self.executor.declarations());
            if let Some(ref instruction) = self.instruction {
                request = request.with_instruction(instruction.clone());
            }

            let response = match ctx.plugins.before_model(&callback_ctx, &request).await? {
                Some(event) => event,
                None => self.call_model(ctx, &callback_ctx, &request).await?,
            };
            let response = match ctx.plugins.after_model(&callback_ctx, &response).await? {
                Some(rewritten) => rewritten,
                None => response,
            };
            ctx.append(response.clone());

            let calls: Vec<_> = response.tool_calls().into_iter().cloned().collect();
            if calls.is_empty() {
                return Ok(response);
            }

            let results = self
                .executor
                .execute(&calls, &ctx.invocation_id, &self.agent_name, &ctx.plugins)
                .await?;
            for (call, result) in calls.iter().zip(results) {
                ctx.append(Event::tool_result(
                    ctx.invocation_id.clone(),
                    call.name.clone(),
                    result,
                ));
            }
        }
    }

    /// Invoke the model, offering failures to `on_model_error` hooks before
    /// propagating.
    async fn call_model(
        &self,
        ctx: &InvocationContext,
        callback_ctx: &CallbackContext,
        request: &ModelRequest,
    ) -> Result<Event> {
        match self.stream_model(ctx, request).await {
            Ok(event) => Ok(event),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                tracing::debug!(
                    invocation_id = %ctx.invocation_id,
                    model = %self.model.name(),
                    error = %err,
                    "model call failed, offering to plugins"
                );
                match ctx
                    .plugins
                    .on_model_error(callback_ctx, &self.model, request, &err)
                    .await?
                {
                    Some(event) => Ok(event),
                    None => Err(err),
                }
            }
        }
    }

    /// Drain one model turn through the accumulator, relaying text deltas as
    /// partial events.
    async fn stream_model(&self, ctx: &InvocationContext, request: &ModelRequest) -> Result<Event> {
        let mut stream = self.model.call(request.clone()).await?;
        let mut accumulator = StreamAccumulator::new();
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if ctx.config.save_partial_events {
                if let Some(ref text) = fragment.text {
                    if !text.is_empty() {
                        ctx.emit(Event::model_partial(ctx.invocation_id.clone(), text.clone()));
                    }
                }
            }
            accumulator.push(&fragment);
            if accumulator.is_done() {
                break;
            }
        }

        let (text, calls) = accumulator.finish();
        let mut content = Vec::new();
        if !text.is_empty() {
            content.push(ContentPart::Text { text });
        }
        for call in calls {
            content.push(ContentPart::ToolCall(call));
        }
        Ok(Event::new(ctx.invocation_id.clone(), Author::Model, content))
    }
}

impl std::fmt::Debug for LlmFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmFlow")
            .field("model", &self.model.name())
            .field("agent_name", &self.agent_name)
            .finish()
    }
}
