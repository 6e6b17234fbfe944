//! Concurrent tool-call execution with plugin interception.

use std::sync::Arc;

use futures::future;

use crate::error::{Result, TychoError};
use crate::model::ToolDeclaration;
use crate::plugin::PluginManager;
use crate::types::{ToolCall, ToolResult};

use super::tool::{Tool, ToolContext};

/// Resolves and invokes the tool calls extracted from one completed turn.
///
/// All calls run concurrently; the returned results preserve the request
/// order regardless of completion order, and every result references its
/// request's call id.
pub struct ToolExecutor {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolExecutor {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Schema metadata for every registered tool.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.iter().map(|t| t.declaration()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute every call from one turn, one result per request.
    ///
    /// An unknown tool name is a local error producing a structured result;
    /// an invocation error that no plugin substitutes for propagates and
    /// aborts the batch.
    pub async fn execute(
        &self,
        calls: &[ToolCall],
        invocation_id: &str,
        agent_name: &str,
        plugins: &PluginManager,
    ) -> Result<Vec<ToolResult>> {
        let futures = calls
            .iter()
            .map(|call| self.execute_one(call, invocation_id, agent_name, plugins));
        future::join_all(futures)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()
    }

    async fn execute_one(
        &self,
        call: &ToolCall,
        invocation_id: &str,
        agent_name: &str,
        plugins: &PluginManager,
    ) -> Result<ToolResult> {
        let ctx = ToolContext {
            invocation_id: invocation_id.to_string(),
            agent_name: agent_name.to_string(),
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
        };

        let mut result = match plugins.before_tool(&ctx, &call.arguments).await? {
            // Override replaces the call entirely; the tool is not invoked.
            Some(value) => ToolResult {
                tool_call_id: call.id.clone(),
                result: value,
                is_error: false,
            },
            None => match self.tools.iter().find(|t| t.name() == call.name) {
                Some(tool) => {
                    match tool.invoke(call.arguments.clone(), &ctx).await {
                        Ok(value) => ToolResult {
                            tool_call_id: call.id.clone(),
                            result: value,
                            is_error: false,
                        },
                        Err(err) => {
                            let err = TychoError::tool(call.name.clone(), err.to_string());
                            match plugins.on_tool_error(&ctx, &call.arguments, &err).await? {
                                Some(value) => ToolResult {
                                    tool_call_id: call.id.clone(),
                                    result: value,
                                    is_error: false,
                                },
                                None => return Err(err),
                            }
                        }
                    }
                }
                None => {
                    tracing::warn!(
                        invocation_id,
                        tool = %call.name,
                        "unknown tool requested"
                    );
                    ToolResult {
                        tool_call_id: call.id.clone(),
                        result: serde_json::json!({
                            "error": format!("tool '{}' not found", call.name)
                        }),
                        is_error: true,
                    }
                }
            },
        };

        if let Some(value) = plugins.after_tool(&ctx, &call.arguments, &result).await? {
            result.result = value;
        }
        Ok(result)
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        f.debug_struct("ToolExecutor").field("tools", &names).finish()
    }
}
