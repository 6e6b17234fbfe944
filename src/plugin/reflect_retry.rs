//! Tool-failure reflection and scoped retry counters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Result, TychoError};
use crate::tools::tool::ToolContext;
use crate::types::{Event, ToolResult};

use super::{CallbackContext, Plugin};

/// Marker key identifying payloads produced by this plugin, so an already
/// reflected failure is never wrapped twice.
const REFLECTION_MARKER: &str = "reflection";

const GLOBAL_SCOPE_KEY: &str = "global";

/// Which scope a tool's consecutive-failure counter is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryScope {
    /// Counters reset between invocations.
    #[default]
    Invocation,
    /// Counters persist for the process lifetime, detecting a chronically
    /// broken tool across runs.
    Global,
}

/// What happens once a tool's failure count exceeds the retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustedBehavior {
    /// Decline, letting the original error (or failed result) stand.
    #[default]
    Raise,
    /// Substitute a terminal give-up payload.
    Terminal,
}

type FailureCounters = HashMap<String, HashMap<String, u32>>;

/// Extracts an error description from a tool result that completed without
/// raising; `None` means the result counts as a success.
pub type ErrorExtractor = Arc<dyn Fn(&ToolResult) -> Option<String> + Send + Sync>;

/// Turns tool failures into structured reflection guidance the model can
/// read and act on, up to a per-tool retry budget.
///
/// Counters are keyed by `(scope, tool name)` and serialized through an
/// internal queue so concurrent calls to the same tool update atomically.
/// A tool's first success after failures resets its counter.
pub struct ReflectAndRetryToolPlugin {
    max_retries: u32,
    scope: RetryScope,
    on_exhausted: ExhaustedBehavior,
    error_extractor: Option<ErrorExtractor>,
    counters: Mutex<FailureCounters>,
}

impl ReflectAndRetryToolPlugin {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            scope: RetryScope::default(),
            on_exhausted: ExhaustedBehavior::default(),
            error_extractor: None,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_scope(mut self, scope: RetryScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_exhausted_behavior(mut self, on_exhausted: ExhaustedBehavior) -> Self {
        self.on_exhausted = on_exhausted;
        self
    }

    /// Declare how to recognize a failure inside a result that completed
    /// without raising. The default treats `is_error` results and objects
    /// carrying an `"error"` key as failures.
    pub fn with_error_extractor(mut self, extractor: ErrorExtractor) -> Self {
        self.error_extractor = Some(extractor);
        self
    }

    /// Drop all counters held for an invocation scope.
    pub async fn clear_invocation(&self, invocation_id: &str) {
        self.counters.lock().await.remove(invocation_id);
    }

    fn scope_key(&self, invocation_id: &str) -> String {
        match self.scope {
            RetryScope::Invocation => invocation_id.to_string(),
            RetryScope::Global => GLOBAL_SCOPE_KEY.to_string(),
        }
    }

    fn extract_error(&self, result: &ToolResult) -> Option<String> {
        if let Some(ref extractor) = self.error_extractor {
            return extractor(result);
        }
        if result.is_error {
            return Some(
                result
                    .result
                    .get("error")
                    .and_then(|e| e.as_str())
                    .unwrap_or("tool reported an error")
                    .to_string(),
            );
        }
        result
            .result
            .get("error")
            .and_then(|e| e.as_str())
            .map(str::to_string)
    }

    fn is_reflection_payload(result: &ToolResult) -> bool {
        result
            .result
            .get(REFLECTION_MARKER)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Record one failure and decide the response for it.
    async fn record_failure(
        &self,
        ctx: &ToolContext,
        args: &serde_json::Value,
        error: &str,
    ) -> Option<serde_json::Value> {
        let scope = self.scope_key(&ctx.invocation_id);
        let mut counters = self.counters.lock().await;
        let count = counters
            .entry(scope)
            .or_default()
            .entry(ctx.tool_name.clone())
            .and_modify(|c| *c += 1)
            .or_insert(1);

        if *count <= self.max_retries {
            tracing::debug!(
                invocation_id = %ctx.invocation_id,
                tool = %ctx.tool_name,
                attempt = *count,
                "reflecting tool failure back to the model"
            );
            return Some(reflection_payload(ctx, args, error, *count));
        }

        tracing::warn!(
            invocation_id = %ctx.invocation_id,
            tool = %ctx.tool_name,
            failures = *count,
            "tool retry budget exhausted"
        );
        match self.on_exhausted {
            ExhaustedBehavior::Raise => None,
            ExhaustedBehavior::Terminal => Some(serde_json::json!({
                REFLECTION_MARKER: true,
                "terminal": true,
                "tool_name": ctx.tool_name,
                "error": error,
                "guidance": format!(
                    "Tool '{}' failed {} consecutive times and will not be retried. \
                     Continue without it or explain the failure to the user.",
                    ctx.tool_name, *count
                ),
            })),
        }
    }

    async fn reset_counter(&self, ctx: &ToolContext) {
        let scope = self.scope_key(&ctx.invocation_id);
        let mut counters = self.counters.lock().await;
        if let Some(tools) = counters.get_mut(&scope) {
            tools.remove(&ctx.tool_name);
        }
    }
}

#[async_trait]
impl Plugin for ReflectAndRetryToolPlugin {
    fn name(&self) -> &str {
        "reflect_and_retry_tool"
    }

    async fn after_tool(
        &self,
        ctx: &ToolContext,
        args: &serde_json::Value,
        result: &ToolResult,
    ) -> Result<Option<serde_json::Value>> {
        if Self::is_reflection_payload(result) {
            return Ok(None);
        }
        match self.extract_error(result) {
            Some(error) => Ok(self.record_failure(ctx, args, &error).await),
            None => {
                self.reset_counter(ctx).await;
                Ok(None)
            }
        }
    }

    async fn on_tool_error(
        &self,
        ctx: &ToolContext,
        args: &serde_json::Value,
        error: &TychoError,
    ) -> Result<Option<serde_json::Value>> {
        Ok(self.record_failure(ctx, args, &error.to_string()).await)
    }

    /// Terminal path cleanup for the invocation scope. Global counters are
    /// intentionally long-lived.
    async fn after_run(&self, ctx: &CallbackContext) -> Result<Option<Event>> {
        if self.scope == RetryScope::Invocation {
            self.clear_invocation(&ctx.invocation_id).await;
        }
        Ok(None)
    }
}

fn reflection_payload(
    ctx: &ToolContext,
    args: &serde_json::Value,
    error: &str,
    attempt: u32,
) -> serde_json::Value {
    serde_json::json!({
        REFLECTION_MARKER: true,
        "tool_name": ctx.tool_name,
        "attempt": attempt,
        "error": error,
        "arguments_used": args,
        "guidance": format!(
            "The call to '{}' failed. Likely root causes: the arguments were \
             malformed or missing a required field, the referenced resource \
             does not exist, or a precondition was not met. Review the error, \
             correct the arguments, and try again.",
            ctx.tool_name
        ),
    })
}
