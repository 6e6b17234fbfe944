//! Sequential composition: children share one running history.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::error::{Result, TychoError};
use crate::types::Event;

use super::{run_with_hooks, Agent};

/// Runs each child in order, appending each child's final turn to the
/// running history before invoking the next child. A child failure aborts
/// the sequence with an error naming that child; earlier children's turns
/// remain in history.
pub struct SequentialAgent {
    name: String,
    children: Vec<Arc<dyn Agent>>,
}

impl SequentialAgent {
    pub fn new(name: impl Into<String>, children: Vec<Arc<dyn Agent>>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

#[async_trait]
impl Agent for SequentialAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut InvocationContext) -> Result<Event> {
        if self.children.is_empty() {
            return Err(TychoError::Configuration(format!(
                "sequential agent '{}' has no children",
                self.name
            )));
        }

        let mut last_output = None;
        for child in &self.children {
            let mut child_ctx = ctx.child(child.name());
            let output = run_with_hooks(child.as_ref(), &mut child_ctx).await?;
            ctx.absorb(output.clone());
            last_output = Some(output);
        }
        last_output.ok_or_else(|| {
            TychoError::InvalidState(format!("sequential agent '{}' produced no output", self.name))
        })
    }
}
