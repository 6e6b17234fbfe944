//! Shared test helpers: a scripted model and canned tools.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use tycho::error::TychoError;
use tycho::model::{FragmentStream, Model, ModelRequest};
use tycho::tools::{FnTool, Tool};
use tycho::types::{ResponseFragment, ToolCallDelta};

enum ScriptedTurn {
    Fragments(Vec<ResponseFragment>),
    Error(TychoError),
}

/// A model that replays queued turns in order.
///
/// An empty queue yields a plain "ok" text turn, so trailing calls in a
/// loop never hang a test.
pub struct ScriptedModel {
    name: String,
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<ModelRequest>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            turns: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times `call` has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Queue a complete text turn, split into per-word deltas.
    pub fn queue_text(&self, text: &str) {
        let mut fragments: Vec<ResponseFragment> = text
            .split_inclusive(' ')
            .map(ResponseFragment::text)
            .collect();
        fragments.push(ResponseFragment::done());
        self.queue_fragments(fragments);
    }

    /// Queue a turn requesting the given tool calls, with arguments streamed
    /// in two chunks.
    pub fn queue_tool_calls(&self, calls: &[(&str, &str, serde_json::Value)]) {
        let mut fragments = Vec::new();
        for (index, (id, name, args)) in calls.iter().enumerate() {
            fragments.push(ResponseFragment::tool_call(ToolCallDelta {
                index,
                id: Some(id.to_string()),
                name: Some(name.to_string()),
                arguments: String::new(),
            }));
            let raw = args.to_string();
            let split = raw.len() / 2;
            for chunk in [&raw[..split], &raw[split..]] {
                fragments.push(ResponseFragment::tool_call(ToolCallDelta {
                    index,
                    id: None,
                    name: None,
                    arguments: chunk.to_string(),
                }));
            }
        }
        fragments.push(ResponseFragment::done());
        self.queue_fragments(fragments);
    }

    /// Queue a rate-limit failure for the next call.
    pub fn queue_rate_limit(&self) {
        self.queue_error(TychoError::RateLimited {
            retry_after_ms: Some(5),
        });
    }

    pub fn queue_error(&self, error: TychoError) {
        self.turns
            .lock()
            .unwrap()
            .push_back(ScriptedTurn::Error(error));
    }

    pub fn queue_fragments(&self, fragments: Vec<ResponseFragment>) {
        self.turns
            .lock()
            .unwrap()
            .push_back(ScriptedTurn::Fragments(fragments));
    }
}

#[async_trait]
impl Model for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, request: ModelRequest) -> Result<FragmentStream, TychoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let turn = self.turns.lock().unwrap().pop_front();
        let fragments = match turn {
            Some(ScriptedTurn::Fragments(fragments)) => fragments,
            Some(ScriptedTurn::Error(error)) => return Err(error),
            None => vec![ResponseFragment::text("ok"), ResponseFragment::done()],
        };
        Ok(futures::stream::iter(fragments.into_iter().map(Ok)).boxed())
    }
}

/// A tool that returns its arguments under an `"echoed"` key.
pub fn echo_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "echo",
        "Echo the arguments back",
        serde_json::json!({"type": "object"}),
        |args, _ctx| async move { Ok(serde_json::json!({"echoed": args})) },
    ))
}

/// A tool that returns after the given delay, reporting its call id.
pub fn sleepy_tool(name: &str, delay: Duration) -> Arc<dyn Tool> {
    let name = name.to_string();
    Arc::new(FnTool::new(
        name.clone(),
        "Sleep then answer",
        serde_json::json!({"type": "object"}),
        move |_args, ctx| {
            let name = name.clone();
            async move {
                tokio::time::sleep(delay).await;
                Ok(serde_json::json!({"tool": name, "call_id": ctx.call_id}))
            }
        },
    ))
}

/// A tool that always fails with an invocation error.
pub fn failing_tool(name: &str) -> Arc<dyn Tool> {
    let message = format!("{name} is broken");
    Arc::new(FnTool::new(
        name,
        "Always fails",
        serde_json::json!({"type": "object"}),
        move |_args, _ctx| {
            let message = message.clone();
            async move { Err(TychoError::InvalidState(message)) }
        },
    ))
}
