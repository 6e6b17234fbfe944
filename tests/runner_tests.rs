//! End-to-end runs through the Runner: streaming, session persistence,
//! run-level plugin hooks.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use pretty_assertions::assert_eq;

use common::{echo_tool, ScriptedModel};
use tycho::agents::LlmAgent;
use tycho::config::RunConfig;
use tycho::error::{Result, TychoError};
use tycho::plugin::{CallbackContext, Plugin, PluginCallback, PluginManager};
use tycho::runner::Runner;
use tycho::session::{InMemorySessionService, SessionService};
use tycho::types::{Author, Event};

fn runner_for(model: Arc<ScriptedModel>) -> (Runner, Arc<InMemorySessionService>) {
    let agent = Arc::new(LlmAgent::builder().name("assistant").model(model).build());
    let sessions = Arc::new(InMemorySessionService::new());
    let runner = Runner::new("test_app", agent).with_session_service(sessions.clone());
    (runner, sessions)
}

#[tokio::test]
async fn stream_yields_user_turn_partials_and_final_answer() {
    let model = Arc::new(ScriptedModel::new("m1"));
    model.queue_text("hello there");
    let (runner, sessions) = runner_for(model);

    let events: Vec<Event> = runner
        .run("u1", "s1", "hi", RunConfig::default())
        .collect()
        .await;

    assert_eq!(events[0].author, Author::User);
    assert_eq!(events[0].text(), "hi");
    let partials: Vec<&Event> = events.iter().filter(|e| e.partial).collect();
    assert_eq!(partials.len(), 2);
    let last = events.last().unwrap();
    assert!(!last.partial);
    assert_eq!(last.text(), "hello there");

    // Only completed events reach the session store.
    let stored = sessions.events("s1").await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].author, Author::User);
    assert_eq!(stored[1].text(), "hello there");
}

#[tokio::test]
async fn tool_turns_are_persisted_in_order() {
    let model = Arc::new(ScriptedModel::new("m1"));
    model.queue_tool_calls(&[("call_1", "echo", serde_json::json!({"q": "x"}))]);
    model.queue_text("done");
    let agent = Arc::new(
        LlmAgent::builder()
            .name("assistant")
            .model(model)
            .tools(vec![echo_tool()])
            .build(),
    );
    let sessions = Arc::new(InMemorySessionService::new());
    let runner = Runner::new("test_app", agent).with_session_service(sessions.clone());

    let config = RunConfig::builder().save_partial_events(false).build();
    let events = runner.run_collect("u1", "s1", "use echo", config).await.unwrap();

    let authors: Vec<&Author> = events.iter().map(|e| &e.author).collect();
    assert_eq!(
        authors,
        vec![
            &Author::User,
            &Author::Model,
            &Author::Tool("echo".into()),
            &Author::Model,
        ]
    );
    assert_eq!(sessions.events("s1").await.unwrap().len(), 4);
}

#[tokio::test]
async fn fatal_errors_surface_as_a_terminal_stream_event() {
    let model = Arc::new(ScriptedModel::new("m1"));
    model.queue_error(TychoError::model("m1", "upstream rejected the request"));
    let (runner, _sessions) = runner_for(model);

    let events: Vec<Event> = runner
        .run("u1", "s1", "hi", RunConfig::default())
        .collect()
        .await;

    let last = events.last().unwrap();
    assert!(last.is_error());
    assert!(last
        .error
        .as_ref()
        .unwrap()
        .contains("upstream rejected the request"));
}

#[tokio::test]
async fn run_collect_returns_the_error_directly() {
    let model = Arc::new(ScriptedModel::new("m1"));
    model.queue_error(TychoError::model("m1", "upstream rejected the request"));
    let (runner, _sessions) = runner_for(model);

    let err = runner
        .run_collect("u1", "s1", "hi", RunConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TychoError::Agent { .. }));
}

struct ShortCircuitPlugin;

#[async_trait]
impl Plugin for ShortCircuitPlugin {
    fn name(&self) -> &str {
        "short_circuit"
    }

    async fn before_run(&self, ctx: &CallbackContext) -> Result<Option<Event>> {
        Ok(Some(Event::model_text(
            ctx.invocation_id.clone(),
            "canned answer",
        )))
    }
}

#[tokio::test]
async fn before_run_override_skips_the_agent_entirely() {
    let model = Arc::new(ScriptedModel::new("m1"));
    model.queue_text("never produced");
    let agent = Arc::new(
        LlmAgent::builder()
            .name("assistant")
            .model(model.clone())
            .build(),
    );
    let mut plugins = PluginManager::new();
    plugins.register(Arc::new(ShortCircuitPlugin)).unwrap();
    let runner = Runner::new("test_app", agent).with_plugins(Arc::new(plugins));

    let events = runner
        .run_collect("u1", "s1", "hi", RunConfig::default())
        .await
        .unwrap();

    assert_eq!(model.call_count(), 0);
    assert_eq!(events.last().unwrap().text(), "canned answer");
}

struct FailingAfterRunPlugin;

#[async_trait]
impl Plugin for FailingAfterRunPlugin {
    fn name(&self) -> &str {
        "failing_after_run"
    }

    async fn after_run(&self, _ctx: &CallbackContext) -> Result<Option<Event>> {
        Err(TychoError::InvalidState("cleanup failed".into()))
    }
}

#[tokio::test]
async fn after_run_hook_failure_fails_an_otherwise_successful_run() {
    let model = Arc::new(ScriptedModel::new("m1"));
    model.queue_text("fine");
    model.queue_text("fine");
    let agent = Arc::new(LlmAgent::builder().name("assistant").model(model).build());
    let mut plugins = PluginManager::new();
    plugins.register(Arc::new(FailingAfterRunPlugin)).unwrap();
    let runner = Runner::new("test_app", agent).with_plugins(Arc::new(plugins));

    let err = runner
        .run_collect("u1", "s1", "hi", RunConfig::default())
        .await
        .unwrap_err();
    match err {
        TychoError::PluginHook {
            plugin, callback, ..
        } => {
            assert_eq!(plugin, "failing_after_run");
            assert_eq!(callback, PluginCallback::AfterRun);
        }
        other => panic!("expected PluginHook, got {other:?}"),
    }

    // Streaming consumers get the same failure as a terminal event.
    let events: Vec<Event> = runner
        .run("u1", "s1", "hi", RunConfig::default())
        .collect()
        .await;
    let last = events.last().unwrap();
    assert!(last.is_error());
    assert!(last.error.as_ref().unwrap().contains("failing_after_run"));
}

#[tokio::test]
async fn run_errors_take_precedence_over_after_run_hook_failures() {
    let model = Arc::new(ScriptedModel::new("m1"));
    model.queue_error(TychoError::model("m1", "upstream rejected the request"));
    let agent = Arc::new(LlmAgent::builder().name("assistant").model(model).build());
    let mut plugins = PluginManager::new();
    plugins.register(Arc::new(FailingAfterRunPlugin)).unwrap();
    let runner = Runner::new("test_app", agent).with_plugins(Arc::new(plugins));

    let err = runner
        .run_collect("u1", "s1", "hi", RunConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TychoError::Agent { .. }));
}

struct RedactingPlugin;

#[async_trait]
impl Plugin for RedactingPlugin {
    fn name(&self) -> &str {
        "redacting"
    }

    async fn on_event(&self, _ctx: &CallbackContext, event: &Event) -> Result<Option<Event>> {
        if event.partial || !event.text().contains("secret") {
            return Ok(None);
        }
        let mut redacted = event.clone();
        redacted.content = vec![tycho::types::ContentPart::Text {
            text: event.text().replace("secret", "[redacted]"),
        }];
        Ok(Some(redacted))
    }
}

#[tokio::test]
async fn on_event_can_rewrite_streamed_events() {
    let model = Arc::new(ScriptedModel::new("m1"));
    model.queue_text("the secret word");
    let agent = Arc::new(LlmAgent::builder().name("assistant").model(model).build());
    let mut plugins = PluginManager::new();
    plugins.register(Arc::new(RedactingPlugin)).unwrap();
    let sessions = Arc::new(InMemorySessionService::new());
    let runner = Runner::new("test_app", agent)
        .with_plugins(Arc::new(plugins))
        .with_session_service(sessions.clone());

    let config = RunConfig::builder().save_partial_events(false).build();
    let events = runner.run_collect("u1", "s1", "hi", config).await.unwrap();

    assert_eq!(events.last().unwrap().text(), "the [redacted] word");
    // The rewritten form is what gets persisted.
    let stored = sessions.events("s1").await.unwrap();
    assert_eq!(stored.last().unwrap().text(), "the [redacted] word");
}

struct RewritingUserMessagePlugin;

#[async_trait]
impl Plugin for RewritingUserMessagePlugin {
    fn name(&self) -> &str {
        "rewriting_user_message"
    }

    async fn on_user_message(
        &self,
        ctx: &CallbackContext,
        message: &Event,
    ) -> Result<Option<Event>> {
        Ok(Some(Event::user(
            ctx.invocation_id.clone(),
            format!("{} (verified)", message.text()),
        )))
    }
}

#[tokio::test]
async fn user_message_rewrites_reach_the_model() {
    let model = Arc::new(ScriptedModel::new("m1"));
    model.queue_text("ack");
    let agent = Arc::new(
        LlmAgent::builder()
            .name("assistant")
            .model(model.clone())
            .build(),
    );
    let mut plugins = PluginManager::new();
    plugins.register(Arc::new(RewritingUserMessagePlugin)).unwrap();
    let runner = Runner::new("test_app", agent).with_plugins(Arc::new(plugins));

    runner
        .run_collect("u1", "s1", "hi", RunConfig::default())
        .await
        .unwrap();

    let requests = model.requests();
    assert_eq!(requests[0].messages[0].text(), "hi (verified)");
}
