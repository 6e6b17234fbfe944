//! Top-level run driver.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::agents::{run_with_hooks, Agent};
use crate::config::RunConfig;
use crate::context::{EventSink, InvocationContext};
use crate::error::Result;
use crate::plugin::{CallbackContext, PluginManager};
use crate::session::{InMemorySessionService, SessionService};
use crate::types::{Author, Event};

/// Creates the invocation context, feeds the initial user turn into the
/// chosen agent, and streams resulting events back while appending them to
/// session history.
#[derive(Clone)]
pub struct Runner {
    app_name: String,
    agent: Arc<dyn Agent>,
    plugins: Arc<PluginManager>,
    session_service: Arc<dyn SessionService>,
}

impl Runner {
    pub fn new(app_name: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        Self {
            app_name: app_name.into(),
            agent,
            plugins: Arc::new(PluginManager::new()),
            session_service: Arc::new(InMemorySessionService::new()),
        }
    }

    pub fn with_plugins(mut self, plugins: Arc<PluginManager>) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_session_service(mut self, session_service: Arc<dyn SessionService>) -> Self {
        self.session_service = session_service;
        self
    }

    /// Start a run, streaming events as they are produced.
    ///
    /// The stream terminates when the agent completes or fatally errors; a
    /// fatal error arrives as a final error-flagged event so a live consumer
    /// is never left mid-stream without a terminal signal.
    pub fn run(
        &self,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        content: impl Into<String>,
        config: RunConfig,
    ) -> UnboundedReceiverStream<Event> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let runner = self.clone();
        let user_id = user_id.into();
        let session_id = session_id.into();
        let content = content.into();
        tokio::spawn(async move {
            // Fatal errors have already been surfaced on the stream.
            let _ = runner
                .drive(user_id, session_id, content, config, out_tx)
                .await;
        });
        UnboundedReceiverStream::new(out_rx)
    }

    /// Run to completion without streaming. Fatal errors are returned as
    /// `Err` instead of an error-flagged event.
    pub async fn run_collect(
        &self,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        content: impl Into<String>,
        config: RunConfig,
    ) -> Result<Vec<Event>> {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        self.drive(
            user_id.into(),
            session_id.into(),
            content.into(),
            config,
            out_tx,
        )
        .await
    }

    /// Tear down the registered plugins.
    pub async fn close(&self) -> Result<()> {
        self.plugins.close().await
    }

    async fn drive(
        &self,
        user_id: String,
        session_id: String,
        content: String,
        config: RunConfig,
        out_tx: mpsc::UnboundedSender<Event>,
    ) -> Result<Vec<Event>> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let sink: EventSink = Arc::new(move |event: Event| {
            let _ = event_tx.send(event);
        });
        let mut ctx = InvocationContext::new(
            session_id.clone(),
            user_id,
            self.app_name.clone(),
            self.agent.name(),
            config,
            self.plugins.clone(),
            self.session_service.clone(),
        )
        .with_sink(sink);
        let callback_ctx = ctx.callback_context(self.agent.name());

        tracing::debug!(
            invocation_id = %ctx.invocation_id,
            session_id = %session_id,
            agent = %self.agent.name(),
            "run start"
        );

        let mut pump = EventPump::new(
            self.plugins.clone(),
            self.session_service.clone(),
            callback_ctx.clone(),
            out_tx,
        );

        let result = self
            .drive_inner(&mut ctx, &callback_ctx, content, &mut event_rx, &mut pump)
            .await;

        // Terminal-path plugin dispatch runs regardless of outcome. A hook
        // failure here is fatal like any other; it only yields to an error
        // the run already carries.
        let result = match (result, self.plugins.after_run(&callback_ctx).await) {
            (Ok(()), Err(hook_err)) => Err(hook_err),
            (Err(run_err), Err(hook_err)) => {
                tracing::warn!(
                    invocation_id = %ctx.invocation_id,
                    error = %hook_err,
                    "after_run dispatch failed while surfacing a run error"
                );
                Err(run_err)
            }
            (result, Ok(_)) => result,
        };

        match result {
            Ok(()) => {
                tracing::debug!(invocation_id = %ctx.invocation_id, "run completed");
                Ok(pump.forwarded)
            }
            Err(err) => {
                let terminal = Event::error(
                    ctx.invocation_id.clone(),
                    Author::Agent(self.agent.name().to_string()),
                    err.to_string(),
                );
                pump.process(terminal).await?;
                Err(err)
            }
        }
    }

    async fn drive_inner(
        &self,
        ctx: &mut InvocationContext,
        callback_ctx: &CallbackContext,
        content: String,
        event_rx: &mut mpsc::UnboundedReceiver<Event>,
        pump: &mut EventPump,
    ) -> Result<()> {
        let mut user_event = Event::user(ctx.invocation_id.clone(), content);
        if let Some(replaced) = self
            .plugins
            .on_user_message(callback_ctx, &user_event)
            .await?
        {
            user_event = replaced;
        }
        ctx.append(user_event);

        if let Some(short_circuit) = self.plugins.before_run(callback_ctx).await? {
            pump.drain(event_rx).await?;
            pump.process(short_circuit).await?;
            return Ok(());
        }

        let run_future = run_with_hooks(self.agent.as_ref(), ctx);
        tokio::pin!(run_future);

        let outcome = loop {
            tokio::select! {
                outcome = &mut run_future => break outcome,
                Some(event) = event_rx.recv() => pump.process(event).await?,
            }
        };
        pump.drain(event_rx).await?;

        let final_event = outcome?;
        if !pump.seen.contains(&final_event.id) {
            // Composite outputs are returned rather than streamed; forward
            // them here so the caller always sees the final turn.
            pump.process(final_event).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("app_name", &self.app_name)
            .field("agent", &self.agent.name())
            .finish()
    }
}

/// Applies `on_event` interception, session persistence, and caller
/// forwarding to each streamed event, in order.
struct EventPump {
    plugins: Arc<PluginManager>,
    session_service: Arc<dyn SessionService>,
    callback_ctx: CallbackContext,
    out_tx: mpsc::UnboundedSender<Event>,
    seen: HashSet<String>,
    forwarded: Vec<Event>,
}

impl EventPump {
    fn new(
        plugins: Arc<PluginManager>,
        session_service: Arc<dyn SessionService>,
        callback_ctx: CallbackContext,
        out_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            plugins,
            session_service,
            callback_ctx,
            out_tx,
            seen: HashSet::new(),
            forwarded: Vec::new(),
        }
    }

    async fn process(&mut self, event: Event) -> Result<()> {
        self.seen.insert(event.id.clone());
        let event = match self.plugins.on_event(&self.callback_ctx, &event).await? {
            Some(replaced) => replaced,
            None => event,
        };
        if !event.partial {
            self.session_service
                .append(&self.callback_ctx.session_id, &event)
                .await?;
        }
        self.forwarded.push(event.clone());
        let _ = self.out_tx.send(event);
        Ok(())
    }

    async fn drain(&mut self, event_rx: &mut mpsc::UnboundedReceiver<Event>) -> Result<()> {
        while let Ok(event) = event_rx.try_recv() {
            self.process(event).await?;
        }
        Ok(())
    }
}
