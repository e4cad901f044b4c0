//! Graph Engine (C6): the node table and dispatch loop —
//! `coordinator -> planner -> supervisor <-> worker*` -> terminal,
//! implemented as an explicit loop over a recursion counter rather than a
//! graph-library dispatch table (see DESIGN.md's "Dynamic node graph"
//! note).

use wk_artifacts::ArtifactStore;
use wk_domain::config::EngineConfig;
use wk_domain::error::Result;
use wk_domain::event::{worker_to_step_info, Event};
use wk_domain::state::SessionState;
use wk_domain::trace::TraceEvent;
use wk_domain::worker::{RouteDecision, WorkerName};
use wk_providers::LlmRouter;
use wk_tools::ToolRegistry;

use crate::bus::EventBus;
use crate::cancel::CancelToken;
use crate::nodes::{coordinator, planner, supervisor};
use crate::roster::WorkerRoster;

/// Drive one task's graph traversal to completion. Never emits
/// `start_of_workflow`/`end_of_workflow` itself — the facade (C7) owns
/// those since it also owns the workflow id.
pub enum GraphOutcome {
    /// The coordinator never handed off; nothing else ran.
    SmallTalk,
    /// The planner failed to parse a plan; task ends without a plan.
    PlanParseFailed,
    /// The graph ran to completion (supervisor FINISH, recursion cap, or
    /// the reporter's terminal path).
    Completed,
}

pub async fn run(
    workflow_id: &str,
    state: &mut SessionState,
    router: &LlmRouter,
    artifacts: &ArtifactStore,
    roster: &WorkerRoster,
    tools: &ToolRegistry,
    events: &EventBus,
    cancel: &CancelToken,
    config: &EngineConfig,
) -> Result<GraphOutcome> {
    match coordinator::run(state, router, artifacts, events, cancel, config.coordinator_buffer_chunks).await? {
        coordinator::CoordinatorOutcome::Ended => return Ok(GraphOutcome::SmallTalk),
        coordinator::CoordinatorOutcome::HandoffToPlanner => {}
    }

    if cancel.is_cancelled() {
        return Ok(GraphOutcome::SmallTalk);
    }

    // Deferred gating: only a confirmed handoff earns a start_of_workflow.
    if !events
        .send(Event::StartOfWorkflow { workflow_id: workflow_id.to_string(), input: None }, cancel)
        .await
    {
        return Ok(GraphOutcome::Completed);
    }

    match planner::run(state, router, artifacts, tools, events, cancel).await? {
        planner::PlannerOutcome::ParseFailed => return Ok(GraphOutcome::PlanParseFailed),
        planner::PlannerOutcome::Planned => {}
    }

    let task_id = state
        .task_id
        .clone()
        .expect("coordinator always sets task_id before planner runs");

    for depth in 0..config.recursion_cap {
        if cancel.is_cancelled() {
            return Ok(GraphOutcome::Completed);
        }

        TraceEvent::NodeEntered {
            task_id: task_id.as_str().to_string(),
            node: "supervisor".to_string(),
            recursion_depth: depth,
        }
        .emit();

        let decision = supervisor::run(state, router).await?;

        let worker_name = match decision {
            RouteDecision::Finish => break,
            RouteDecision::Worker(name) => name,
        };

        let total_steps = state.plan.steps.len();
        let step_index = state.cursor + 1;
        let matched_step = state
            .current_step()
            .map(|s| s.worker_name == worker_name.as_str())
            .unwrap_or(false);

        if matched_step {
            let step_info = worker_to_step_info(worker_name, state.current_step().expect("matched_step implies Some"));
            if !events
                .send(
                    Event::StepStarted { step_index, total_steps, step_info },
                    cancel,
                )
                .await
            {
                return Ok(GraphOutcome::Completed);
            }
        }

        let worker = roster.get(worker_name);
        let outcome = worker
            .run_turn(
                router,
                &state.messages,
                events,
                cancel,
                std::time::Duration::from_millis(config.tool_timeout_ms),
                config.worker_step_cap,
            )
            .await;

        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                // Best-effort: a single worker failure does not abort the
                // task; feed the error back as the worker's response and
                // let the supervisor decide what's next.
                state.append_worker_response(worker_name, format!("error: {e}"));
                if matched_step {
                    let step_info = worker_to_step_info(worker_name, state.current_step().expect("still the same step"));
                    let _ = events.send(Event::StepEnd { step_index, total_steps, step_info }, cancel).await;
                }
                state.advance_if_matches(worker_name);
                continue;
            }
        };

        if worker_name == WorkerName::Reporter {
            if let Err(e) = artifacts.write_final(&task_id, &outcome.text) {
                TraceEvent::ArtifactWriteFailed {
                    task_id: task_id.as_str().to_string(),
                    kind: "final".to_string(),
                    error: e.to_string(),
                }
                .emit();
            }
            state.append_worker_response(worker_name, outcome.text);
            if matched_step {
                let step_info = worker_to_step_info(worker_name, state.current_step().expect("still the same step"));
                let _ = events.send(Event::StepEnd { step_index, total_steps, step_info }, cancel).await;
            }
            state.advance_if_matches(worker_name);
            break;
        }

        match artifacts.write_summary(&task_id, worker_name.as_str(), &outcome.text).await {
            Ok(summary) => state.push_summary(summary),
            Err(e) => TraceEvent::ArtifactWriteFailed {
                task_id: task_id.as_str().to_string(),
                kind: "summary".to_string(),
                error: e.to_string(),
            }
            .emit(),
        }

        state.append_worker_response(worker_name, outcome.text);

        if matched_step {
            let step_info = worker_to_step_info(worker_name, state.current_step().expect("still the same step"));
            if !events
                .send(Event::StepEnd { step_index, total_steps, step_info }, cancel)
                .await
            {
                return Ok(GraphOutcome::Completed);
            }
        }
        state.advance_if_matches(worker_name);

        if depth + 1 == config.recursion_cap {
            TraceEvent::RecursionCapHit { task_id: task_id.as_str().to_string(), cap: config.recursion_cap }.emit();
        }
    }

    Ok(GraphOutcome::Completed)
}
