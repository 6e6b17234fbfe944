//! Event types: the append-only unit of conversation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Author {
    User,
    Model,
    Agent(String),
    Tool(String),
}

/// A single part of event content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A tool execution result. Must reference the call that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub result: serde_json::Value,
    #[serde(default)]
    pub is_error: bool,
}

/// One exchange unit in an invocation.
///
/// Events are append-only: once yielded to a caller or appended to session
/// history they are never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    pub invocation_id: String,
    pub author: Author,
    pub content: Vec<ContentPart>,
    /// Incremental fragment of a turn still being streamed.
    #[serde(default)]
    pub partial: bool,
    /// Set on terminal error events surfaced through a streaming consumer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(invocation_id: impl Into<String>, author: Author, content: Vec<ContentPart>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            invocation_id: invocation_id.into(),
            author,
            content,
            partial: false,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a user event from plain text.
    pub fn user(invocation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            invocation_id,
            Author::User,
            vec![ContentPart::Text { text: text.into() }],
        )
    }

    /// Create a complete model event from plain text.
    pub fn model_text(invocation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            invocation_id,
            Author::Model,
            vec![ContentPart::Text { text: text.into() }],
        )
    }

    /// Create a partial model event carrying one text delta.
    pub fn model_partial(invocation_id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut event = Self::model_text(invocation_id, text);
        event.partial = true;
        event
    }

    /// Create a tool-result event authored by the named tool.
    pub fn tool_result(
        invocation_id: impl Into<String>,
        tool_name: impl Into<String>,
        result: ToolResult,
    ) -> Self {
        Self::new(
            invocation_id,
            Author::Tool(tool_name.into()),
            vec![ContentPart::ToolResult(result)],
        )
    }

    /// Create a terminal error-flagged event for a streaming consumer.
    pub fn error(invocation_id: impl Into<String>, author: Author, message: impl Into<String>) -> Self {
        let mut event = Self::new(invocation_id, author, Vec::new());
        event.error = Some(message.into());
        event
    }

    /// Extract the text content, concatenating all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract tool calls from this event.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .collect()
    }

    /// Extract tool results from this event.
    pub fn tool_results(&self) -> Vec<&ToolResult> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolResult(tr) => Some(tr),
                _ => None,
            })
            .collect()
    }

    /// Whether this event closes the stream with a fatal error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
