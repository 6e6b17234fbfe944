//! Accumulates partial model-response fragments into one logical turn.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::types::{ResponseFragment, ToolCall, ToolCallDelta};

/// Buffer for one in-flight tool call, keyed by fragment index.
#[derive(Debug, Default, Clone)]
struct ToolCallBuffer {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Merges a fragment stream into a single accumulated turn.
///
/// Text deltas concatenate in arrival order. Tool-call deltas accumulate
/// into per-index buffers and are only parsed once the stream signals turn
/// completion. A buffer whose argument text is not well-formed JSON at that
/// point becomes a tool call carrying an error payload instead of failing
/// the turn, so the loop can keep moving and the model can correct itself.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    tool_buffers: BTreeMap<usize, ToolCallBuffer>,
    done: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one fragment. Fragments arriving after the completion marker
    /// are ignored.
    pub fn push(&mut self, fragment: &ResponseFragment) {
        if self.done {
            return;
        }
        if let Some(ref text) = fragment.text {
            self.text.push_str(text);
        }
        for delta in &fragment.tool_calls {
            self.push_tool_delta(delta);
        }
        if fragment.done {
            self.done = true;
        }
    }

    fn push_tool_delta(&mut self, delta: &ToolCallDelta) {
        let buffer = self.tool_buffers.entry(delta.index).or_default();
        if let Some(ref id) = delta.id {
            buffer.id.get_or_insert_with(|| id.clone());
        }
        if let Some(ref name) = delta.name {
            buffer.name.get_or_insert_with(|| name.clone());
        }
        buffer.arguments.push_str(&delta.arguments);
    }

    /// Whether the completion marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Accumulated text so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Finalize the turn: accumulated text plus parsed tool calls in index
    /// order.
    pub fn finish(self) -> (String, Vec<ToolCall>) {
        let calls = self
            .tool_buffers
            .into_values()
            .map(finalize_buffer)
            .collect();
        (self.text, calls)
    }
}

fn finalize_buffer(buffer: ToolCallBuffer) -> ToolCall {
    let id = buffer
        .id
        .unwrap_or_else(|| format!("call_{}", Uuid::new_v4()));
    let name = buffer.name.unwrap_or_default();
    let arguments = if buffer.arguments.trim().is_empty() {
        serde_json::json!({})
    } else {
        match serde_json::from_str(&buffer.arguments) {
            Ok(value) => value,
            Err(err) => serde_json::json!({
                "error": format!("malformed tool arguments: {err}"),
                "raw_arguments": buffer.arguments,
            }),
        }
    };
    ToolCall {
        id,
        name,
        arguments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_deltas_concatenate_in_order() {
        let mut acc = StreamAccumulator::new();
        acc.push(&ResponseFragment::text("Hel"));
        acc.push(&ResponseFragment::text("lo"));
        acc.push(&ResponseFragment::done());
        let (text, calls) = acc.finish();
        assert_eq!(text, "Hello");
        assert!(calls.is_empty());
    }

    #[test]
    fn interleaved_tool_call_deltas_reassemble_by_index() {
        let mut acc = StreamAccumulator::new();
        acc.push(&ResponseFragment::tool_call(ToolCallDelta {
            index: 0,
            id: Some("call_a".into()),
            name: Some("search".into()),
            arguments: "{\"q\":".into(),
        }));
        acc.push(&ResponseFragment::tool_call(ToolCallDelta {
            index: 1,
            id: Some("call_b".into()),
            name: Some("fetch".into()),
            arguments: "{\"url\":\"x\"}".into(),
        }));
        acc.push(&ResponseFragment::tool_call(ToolCallDelta {
            index: 0,
            id: None,
            name: None,
            arguments: "\"rust\"}".into(),
        }));
        acc.push(&ResponseFragment::done());

        let (_, calls) = acc.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].arguments, serde_json::json!({"q": "rust"}));
        assert_eq!(calls[1].id, "call_b");
        assert_eq!(calls[1].arguments, serde_json::json!({"url": "x"}));
    }

    #[test]
    fn malformed_arguments_become_error_payload() {
        let mut acc = StreamAccumulator::new();
        acc.push(&ResponseFragment::tool_call(ToolCallDelta {
            index: 0,
            id: Some("call_a".into()),
            name: Some("search".into()),
            arguments: "{\"q\": not json".into(),
        }));
        acc.push(&ResponseFragment::done());

        let (_, calls) = acc.finish();
        assert_eq!(calls.len(), 1);
        let args = &calls[0].arguments;
        assert!(args["error"]
            .as_str()
            .unwrap()
            .contains("malformed tool arguments"));
        assert_eq!(args["raw_arguments"], "{\"q\": not json");
    }

    #[test]
    fn empty_arguments_parse_as_empty_object() {
        let mut acc = StreamAccumulator::new();
        acc.push(&ResponseFragment::tool_call(ToolCallDelta {
            index: 0,
            id: Some("call_a".into()),
            name: Some("ping".into()),
            arguments: String::new(),
        }));
        acc.push(&ResponseFragment::done());
        let (_, calls) = acc.finish();
        assert_eq!(calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn missing_call_id_is_generated() {
        let mut acc = StreamAccumulator::new();
        acc.push(&ResponseFragment::tool_call(ToolCallDelta {
            index: 3,
            id: None,
            name: Some("ping".into()),
            arguments: "{}".into(),
        }));
        acc.push(&ResponseFragment::done());
        let (_, calls) = acc.finish();
        assert!(calls[0].id.starts_with("call_"));
    }

    #[test]
    fn fragments_after_done_are_ignored() {
        let mut acc = StreamAccumulator::new();
        acc.push(&ResponseFragment::text("final"));
        acc.push(&ResponseFragment::done());
        acc.push(&ResponseFragment::text(" trailing"));
        assert!(acc.is_done());
        let (text, _) = acc.finish();
        assert_eq!(text, "final");
    }
}
