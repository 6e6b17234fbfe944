//! Tool collaborators and concurrent execution.

pub mod executor;
pub mod tool;

pub use executor::ToolExecutor;
pub use tool::{FnTool, Tool, ToolContext};
