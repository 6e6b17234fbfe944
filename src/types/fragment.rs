//! Streaming fragment types emitted by a model collaborator.

use serde::{Deserialize, Serialize};

/// A partial tool call carried by one fragment.
///
/// `index` is stable within one turn but not across turns; `arguments` is a
/// raw text delta that concatenates into the full argument JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: String,
}

/// One partial response fragment from the model stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseFragment {
    /// Incremental text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Partial tool calls being built up.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDelta>,
    /// Completion marker for the whole turn.
    #[serde(default)]
    pub done: bool,
}

impl ResponseFragment {
    /// A text delta fragment.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A tool-call delta fragment.
    pub fn tool_call(delta: ToolCallDelta) -> Self {
        Self {
            tool_calls: vec![delta],
            ..Self::default()
        }
    }

    /// The turn completion marker.
    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}
