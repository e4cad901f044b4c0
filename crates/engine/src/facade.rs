//! Orchestration Facade (C7): the single public entry point. Wraps the
//! graph engine behind `run(messages, options) -> EventReceiver`, owning
//! workflow-id allocation and the `start_of_workflow`/`end_of_workflow`
//! pairing invariant: exactly one `end_of_workflow`, and `start_of_workflow`
//! only once the coordinator has actually handed off to the rest of the
//! graph.

use std::sync::Arc;

use wk_artifacts::ArtifactStore;
use wk_domain::config::EngineConfig;
use wk_domain::event::{new_workflow_id, Event};
use wk_domain::message::Message;
use wk_domain::state::{Options, SessionState};
use wk_providers::LlmRouter;
use wk_tools::ToolRegistry;

use crate::bus::{self, EventReceiver};
use crate::cancel::CancelToken;
use crate::graph;
use crate::roster::WorkerRoster;

/// Bundles the dependencies every task's graph traversal needs. Built once
/// at process startup (by the gateway crate) and shared across requests.
#[derive(Clone)]
pub struct Engine {
    router: Arc<LlmRouter>,
    artifacts: Arc<ArtifactStore>,
    roster: Arc<WorkerRoster>,
    tools: Arc<ToolRegistry>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(router: LlmRouter, artifacts: ArtifactStore, tools: ToolRegistry, config: EngineConfig) -> Self {
        Self::from_shared(router, Arc::new(artifacts), tools, config)
    }

    /// Like [`Engine::new`], but takes an already-shared [`ArtifactStore`]
    /// so a caller can register a `task_files_json` tool over the same
    /// instance the engine writes through (that tool reads this same
    /// store's index).
    pub fn from_shared(
        router: LlmRouter,
        artifacts: Arc<ArtifactStore>,
        tools: ToolRegistry,
        config: EngineConfig,
    ) -> Self {
        let roster = WorkerRoster::build(&tools);
        Self {
            router: Arc::new(router),
            artifacts,
            roster: Arc::new(roster),
            tools: Arc::new(tools),
            config,
        }
    }

    /// The LLM gateway backing this engine, for read-only introspection
    /// (`GET /config/providers`).
    pub fn router(&self) -> &LlmRouter {
        &self.router
    }

    /// The fixed worker roster, for read-only introspection
    /// (`GET /config/agents`).
    pub fn roster(&self) -> &WorkerRoster {
        &self.roster
    }

    /// Start a new task. Spawns the graph traversal on its own tokio task
    /// and returns the receiving half of its event stream; dropping the
    /// receiver (e.g. a disconnected HTTP client) is the only cancellation
    /// signal the graph needs.
    pub fn run(&self, messages: Vec<Message>, options: Options) -> EventReceiver {
        let (events, rx) = bus::channel(self.config.event_channel_capacity);
        let cancel = CancelToken::new();
        let workflow_id = new_workflow_id();

        let router = self.router.clone();
        let artifacts = self.artifacts.clone();
        let roster = self.roster.clone();
        let tools = self.tools.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let mut state = SessionState::new(messages, options);
            // start_of_workflow (if earned at all) is emitted inside
            // graph::run, once the coordinator confirms a handoff —
            // never here, and never more than once.
            let result = graph::run(
                &workflow_id,
                &mut state,
                &router,
                &artifacts,
                &roster,
                &tools,
                &events,
                &cancel,
                &config,
            )
            .await;

            // A fatal node error (LLM permanent failure, etc.) still gets
            // exactly one end_of_workflow, carrying the error text in its
            // payload rather than being dropped silently.
            let messages = match result {
                Ok(_) => None,
                Err(e) => Some(serde_json::json!({ "error": e.to_string() })),
            };

            let _ = events
                .send(Event::EndOfWorkflow { workflow_id, messages }, &cancel)
                .await;
        });

        rx
    }
}
