//! Parallel composition: concurrent fan-out with per-branch isolation.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};

use crate::context::InvocationContext;
use crate::error::{Result, TychoError};
use crate::types::{Author, ContentPart, Event};

use super::{run_with_hooks, Agent};

/// Runs all children concurrently against the same initial history.
///
/// Each branch's failure is caught and converted into an error-flagged
/// event for that branch only, plus an error entry in the merged output;
/// siblings are unaffected. Branch outputs merge in completion order, not
/// registration order. A fatal branch error aborts the remaining branches
/// and the whole run.
pub struct ParallelAgent {
    name: String,
    children: Vec<Arc<dyn Agent>>,
}

impl ParallelAgent {
    pub fn new(name: impl Into<String>, children: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

#[async_trait]
impl Agent for ParallelAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut InvocationContext) -> Result<Event> {
        if self.children.is_empty() {
            return Err(TychoError::Configuration(format!(
                "parallel agent '{}' has no children",
                self.name
            )));
        }

        let mut branches = FuturesUnordered::new();
        for child in &self.children {
            let child = child.clone();
            let mut child_ctx = ctx.child(child.name());
            branches.push(tokio::spawn(async move {
                let name = child.name().to_string();
                let outcome = run_with_hooks(child.as_ref(), &mut child_ctx).await;
                (name, outcome)
            }));
        }

        let mut combined_content = Vec::new();
        while let Some(joined) = branches.next().await {
            let (child_name, outcome) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    abort_remaining(&branches);
                    return Err(TychoError::agent(
                        self.name.clone(),
                        format!("branch task panicked: {err}"),
                    ));
                }
            };
            match outcome {
                Ok(output) => {
                    combined_content.extend(output.content.clone());
                    ctx.absorb(output);
                }
                Err(err) if err.is_fatal() => {
                    abort_remaining(&branches);
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(
                        invocation_id = %ctx.invocation_id,
                        branch = %child_name,
                        error = %err,
                        "parallel branch failed"
                    );
                    combined_content.push(ContentPart::Text {
                        text: format!("branch '{child_name}' failed: {err}"),
                    });
                    let event = Event::error(
                        ctx.invocation_id.clone(),
                        Author::Agent(child_name),
                        err.to_string(),
                    );
                    ctx.append(event);
                }
            }
        }

        Ok(Event::new(
            ctx.invocation_id.clone(),
            Author::Agent(self.name.clone()),
            combined_content,
        ))
    }
}

fn abort_remaining<T>(branches: &FuturesUnordered<tokio::task::JoinHandle<T>>) {
    for task in branches.iter() {
        task.abort();
    }
}
