//! Rate-limit retry and model fallback cascade.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::sleep;

use crate::error::{Result, TychoError};
use crate::model::{Model, ModelRequest};
use crate::streaming::StreamAccumulator;
use crate::types::{Author, ContentPart, Event};

use super::{CallbackContext, Plugin};

/// Per-invocation retry/cascade position.
///
/// `fallback_index` only advances forward; the record is dropped on success
/// or exhaustion.
#[derive(Debug, Clone, Copy, Default)]
struct FallbackState {
    retry_count: u32,
    fallback_index: Option<usize>,
}

/// Retries rate-limited model calls, then walks an ordered fallback list.
///
/// Attempt accounting: each model (primary and every fallback) gets
/// `max_retries` attempts; advancing the cascade consumes the first attempt
/// against the new model. Any success clears the invocation's state, and a
/// non-rate-limit error is declined so other plugins or the default error
/// path can handle it.
pub struct ModelFallbackPlugin {
    max_retries: u32,
    retry_delay: Duration,
    fallback_models: Vec<Arc<dyn Model>>,
    states: Mutex<HashMap<String, FallbackState>>,
}

impl ModelFallbackPlugin {
    pub fn new(
        max_retries: u32,
        retry_delay: Duration,
        fallback_models: Vec<Arc<dyn Model>>,
    ) -> Self {
        Self {
            max_retries,
            retry_delay,
            fallback_models,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Drop any retry state held for an invocation.
    pub fn clear_invocation(&self, invocation_id: &str) {
        self.states.lock().unwrap().remove(invocation_id);
    }

    /// Advance the state machine one step and pick the model for the next
    /// attempt. `None` means the cascade is exhausted.
    fn next_attempt(&self, invocation_id: &str, primary: &Arc<dyn Model>) -> Option<Arc<dyn Model>> {
        let mut states = self.states.lock().unwrap();
        let state = states.entry(invocation_id.to_string()).or_default();
        if state.retry_count < self.max_retries {
            state.retry_count += 1;
        } else {
            let next = state.fallback_index.map_or(0, |index| index + 1);
            if next >= self.fallback_models.len() {
                states.remove(invocation_id);
                return None;
            }
            state.fallback_index = Some(next);
            // The advance attempt is the first retry against the new model.
            state.retry_count = 1;
        }
        Some(match state.fallback_index {
            None => primary.clone(),
            Some(index) => self.fallback_models[index].clone(),
        })
    }
}

#[async_trait]
impl Plugin for ModelFallbackPlugin {
    fn name(&self) -> &str {
        "model_fallback"
    }

    async fn on_model_error(
        &self,
        ctx: &CallbackContext,
        model: &Arc<dyn Model>,
        request: &ModelRequest,
        error: &TychoError,
    ) -> Result<Option<Event>> {
        if !error.is_rate_limited() {
            return Ok(None);
        }

        loop {
            let Some(attempt_model) = self.next_attempt(&ctx.invocation_id, model) else {
                tracing::warn!(
                    invocation_id = %ctx.invocation_id,
                    "fallback cascade exhausted"
                );
                return Ok(None);
            };

            sleep(self.retry_delay).await;
            tracing::debug!(
                invocation_id = %ctx.invocation_id,
                model = %attempt_model.name(),
                "retrying rate-limited model call"
            );

            match collect_turn(&attempt_model, request, &ctx.invocation_id).await {
                Ok(event) => {
                    self.clear_invocation(&ctx.invocation_id);
                    return Ok(Some(event));
                }
                Err(err) if err.is_rate_limited() => continue,
                // A different failure mode: decline and let the original
                // rate-limit error propagate through the default path.
                Err(err) => {
                    tracing::warn!(
                        invocation_id = %ctx.invocation_id,
                        model = %attempt_model.name(),
                        error = %err,
                        "fallback attempt failed with non-rate-limit error"
                    );
                    return Ok(None);
                }
            }
        }
    }

    /// A response made it through without the error path running; drop any
    /// stale state for this invocation.
    async fn after_model(
        &self,
        ctx: &CallbackContext,
        _response: &Event,
    ) -> Result<Option<Event>> {
        self.clear_invocation(&ctx.invocation_id);
        Ok(None)
    }

    /// Terminal path cleanup for the invocation scope.
    async fn after_run(&self, ctx: &CallbackContext) -> Result<Option<Event>> {
        self.clear_invocation(&ctx.invocation_id);
        Ok(None)
    }
}

/// Drain one complete model turn without relaying partial events.
async fn collect_turn(
    model: &Arc<dyn Model>,
    request: &ModelRequest,
    invocation_id: &str,
) -> Result<Event> {
    let mut stream = model.call(request.clone()).await?;
    let mut accumulator = StreamAccumulator::new();
    while let Some(fragment) = stream.next().await {
        accumulator.push(&fragment?);
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
    Ok(Event::new(invocation_id.to_string(), Author::Model, content))
}
