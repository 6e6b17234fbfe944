//! Leaf agent backed by a model and a tool set.

use std::sync::Arc;

use async_trait::async_trait;
use bon::Builder;

use crate::context::InvocationContext;
use crate::error::Result;
use crate::flow::LlmFlow;
use crate::model::Model;
use crate::tools::{Tool, ToolExecutor};
use crate::types::Event;

use super::Agent;

/// A model-calling agent: runs the tool-calling loop until the model
/// produces a turn with no tool calls.
#[derive(Builder)]
pub struct LlmAgent {
    #[builder(into)]
    name: String,
    model: Arc<dyn Model>,
    /// Optional system instruction passed with every model request.
    #[builder(into)]
    instruction: Option<String>,
    #[builder(default)]
    tools: Vec<Arc<dyn Tool>>,
}

#[async_trait]
impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut InvocationContext) -> Result<Event> {
        let flow = LlmFlow::new(
            self.model.clone(),
            ToolExecutor::new(self.tools.clone()),
            self.instruction.clone(),
            self.name.clone(),
        );
        flow.run(ctx).await
    }
}

impl std::fmt::Debug for LlmAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAgent")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .field("tools", &self.tools.len())
            .finish()
    }
}
