//! Loop composition: repeated invocation with a termination condition.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::error::{Result, TychoError};
use crate::types::Event;

use super::{run_with_hooks, Agent};

/// Predicate over the latest child output; `false` stops the loop.
pub type ContinuePredicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

enum StopRule {
    /// `max_iterations` is the normal termination bound.
    IterationsOnly,
    Predicate(ContinuePredicate),
    ConditionAgent(Arc<dyn Agent>),
}

/// Repeatedly invokes a single child, feeding its output back as input for
/// the next iteration.
///
/// Termination: a configured predicate or condition agent signals stop, or
/// `max_iterations` is reached. With a predicate or condition agent
/// configured, `max_iterations` acts as a deadman counter and exhausting it
/// is fatal; with neither, it is the normal bound.
pub struct LoopAgent {
    name: String,
    child: Arc<dyn Agent>,
    max_iterations: usize,
    stop_rule: StopRule,
}

impl LoopAgent {
    pub fn new(name: impl Into<String>, child: Arc<dyn Agent>, max_iterations: usize) -> Self {
        Self {
            name: name.into(),
            child,
            max_iterations,
            stop_rule: StopRule::IterationsOnly,
        }
    }

    /// Stop once the predicate over the latest result returns `false`.
    pub fn with_predicate(mut self, predicate: ContinuePredicate) -> Self {
        self.stop_rule = StopRule::Predicate(predicate);
        self
    }

    /// Ask a condition agent whether to continue after each iteration. The
    /// answer is parsed from its text response; only an unambiguous `yes`
    /// continues, anything else stops.
    pub fn with_condition_agent(mut self, condition: Arc<dyn Agent>) -> Self {
        self.stop_rule = StopRule::ConditionAgent(condition);
        self
    }

    async fn should_continue(&self, ctx: &mut InvocationContext, latest: &Event) -> Result<bool> {
        match &self.stop_rule {
            StopRule::IterationsOnly => Ok(true),
            StopRule::Predicate(predicate) => Ok(predicate(latest)),
            StopRule::ConditionAgent(condition) => {
                let mut condition_ctx = ctx.child(condition.name());
                let answer = run_with_hooks(condition.as_ref(), &mut condition_ctx).await?;
                Ok(answer_continues(&answer.text()))
            }
        }
    }
}

#[async_trait]
impl Agent for LoopAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut InvocationContext) -> Result<Event> {
        if self.max_iterations == 0 {
            return Err(TychoError::Configuration(format!(
                "loop agent '{}' has max_iterations = 0",
                self.name
            )));
        }

        let mut last_output = None;
        for iteration in 1..=self.max_iterations {
            tracing::debug!(
                invocation_id = %ctx.invocation_id,
                agent = %self.name,
                iteration,
                "loop iteration"
            );
            let mut child_ctx = ctx.child(self.child.name());
            let output = run_with_hooks(self.child.as_ref(), &mut child_ctx).await?;
            ctx.absorb(output.clone());

            if !self.should_continue(ctx, &output).await? {
                return Ok(output);
            }
            last_output = Some(output);
        }

        match self.stop_rule {
            StopRule::IterationsOnly => last_output.ok_or_else(|| {
                TychoError::InvalidState(format!("loop agent '{}' produced no output", self.name))
            }),
            _ => Err(TychoError::MaxIterationsExceeded {
                limit: self.max_iterations,
            }),
        }
    }
}

/// Strict yes/no parsing for condition-agent answers. Ambiguous or
/// contradictory text defaults to stopping.
fn answer_continues(text: &str) -> bool {
    let normalized = text
        .trim()
        .trim_end_matches(['.', '!'])
        .trim()
        .to_lowercase();
    normalized == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_yes_continues() {
        assert!(answer_continues("yes"));
        assert!(answer_continues(" Yes. "));
        assert!(answer_continues("YES!"));
    }

    #[test]
    fn anything_else_stops() {
        assert!(!answer_continues("no"));
        assert!(!answer_continues("yes, but no"));
        assert!(!answer_continues("probably"));
        assert!(!answer_continues(""));
    }
}
