//! Model collaborator seam.
//!
//! The runtime never talks to a provider directly; it consumes a
//! [`Model`] that turns a request into a stream of
//! [`ResponseFragment`](crate::types::ResponseFragment)s. Which wire
//! protocol backs the stream is the collaborator's business.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Event, ResponseFragment};

/// Stream of partial response fragments for one model turn.
pub type FragmentStream = BoxStream<'static, Result<ResponseFragment>>;

/// A tool exposed to the model as schema metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Request for one model turn.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Optional system instruction, prepended by the calling agent.
    pub instruction: Option<String>,
    /// Ordered turn history for this invocation.
    pub messages: Vec<Event>,
    /// Declared tools, if any.
    pub tools: Vec<ToolDeclaration>,
}

impl ModelRequest {
    pub fn new(messages: Vec<Event>) -> Self {
        Self {
            instruction: None,
            messages,
            tools: Vec::new(),
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }
}

/// Model-call collaborator: `call(request) → stream of fragments`.
#[async_trait]
pub trait Model: Send + Sync {
    /// Identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Start one model turn.
    async fn call(&self, request: ModelRequest) -> Result<FragmentStream>;
}
