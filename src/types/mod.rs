//! Core data types shared across the runtime.

pub mod event;
pub mod fragment;

pub use event::{Author, ContentPart, Event, ToolCall, ToolResult};
pub use fragment::{ResponseFragment, ToolCallDelta};
