//! Planner node: produces the JSON plan that drives the rest of the task.
//! Selects the reasoning role when `deep_thinking` is requested,
//! optionally injects a web search block ahead of planning, streams the
//! raw response, and cleans markdown fencing before parsing the plan.

use std::collections::HashMap;

use futures_util::StreamExt;

use wk_artifacts::ArtifactStore;
use wk_domain::capability::ModelRole;
use wk_domain::error::Result;
use wk_domain::event::{worker_to_step_info, Event};
use wk_domain::message::{ContentPart, Message, MessageContent};
use wk_domain::state::{Plan, SessionState};
use wk_providers::{InvokeOptions, LlmRouter};
use wk_tools::ToolRegistry;

use crate::bus::EventBus;
use crate::cancel::CancelToken;
use crate::json_clean::clean_json_response;
use crate::prompt;

const DEFAULT_PROMPT: &str = "You are the planner of a multi-agent workflow. \
    The current time is <<CURRENT_TIME>>. \
    Given the conversation so far, produce a JSON plan and nothing else, \
    of the form {\"steps\": [{\"worker_name\": <one of researcher, coder, \
    db_analyst, document_parser, chart_generator, reporter>, \"description\": \
    <what that worker should do>}]}.";

pub enum PlannerOutcome {
    Planned,
    ParseFailed,
}

/// Run the planner turn. On success, the plan is written via `artifacts`
/// and `state.plan`/`cursor` are updated; on parse failure, state is left
/// untouched and the graph terminates.
pub async fn run(
    state: &mut SessionState,
    router: &LlmRouter,
    artifacts: &ArtifactStore,
    tools: &ToolRegistry,
    events: &EventBus,
    cancel: &CancelToken,
) -> Result<PlannerOutcome> {
    let mut vars = HashMap::new();
    vars.insert("CURRENT_TIME".to_string(), prompt::current_time());
    let system_prompt = prompt::render(DEFAULT_PROMPT, &vars);

    let mut messages = Vec::with_capacity(state.messages.len() + 1);
    messages.push(Message::system(system_prompt));
    messages.extend_from_slice(&state.messages);

    if state.options.search_before_planning {
        if let Some(search) = tools.get("web_search") {
            if let Some(last) = state.messages.last() {
                let query = last.content.extract_all_text();
                if let Ok(results) = search.invoke(serde_json::json!({ "query": query })).await {
                    let block = format!(
                        "\n\n# Relative Search Results\n\n{}",
                        serde_json::to_string(&results).unwrap_or_default()
                    );
                    if let Some(last) = messages.last_mut() {
                        match &mut last.content {
                            MessageContent::Text(t) => t.push_str(&block),
                            MessageContent::Parts(parts) => {
                                parts.push(ContentPart::Text { text: block });
                            }
                        }
                    }
                }
            }
        }
    }

    let role = if state.options.deep_thinking {
        ModelRole::Reasoning
    } else {
        ModelRole::Basic
    };

    if !events.send(Event::StartOfLlm { agent_name: "planner".into() }, cancel).await {
        return Ok(PlannerOutcome::ParseFailed);
    }

    let opts = InvokeOptions::default();
    let mut stream = router.stream(role, messages, &opts).await?;
    let mut full_response = String::new();
    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Ok(PlannerOutcome::ParseFailed);
        }
        let chunk = chunk?;
        if let Some(content) = chunk.content {
            full_response.push_str(&content);
        }
    }

    let _ = events.send(Event::EndOfLlm { agent_name: "planner".into() }, cancel).await;

    let cleaned = clean_json_response(&full_response);
    let plan: Plan = match serde_json::from_str(&cleaned) {
        Ok(p) => p,
        Err(_) => return Ok(PlannerOutcome::ParseFailed),
    };

    if let Some(task_id) = &state.task_id {
        artifacts.write_plan(task_id, &cleaned)?;
    }

    let total_steps = plan.steps.len();
    let plan_steps = plan
        .steps
        .iter()
        .filter_map(|s| {
            wk_domain::worker::WorkerName::from_str_loose(&s.worker_name)
                .map(|w| worker_to_step_info(w, s))
        })
        .collect();

    state.set_plan(plan);

    let _ = events
        .send(Event::PlanGenerated { plan_steps, total_steps }, cancel)
        .await;

    Ok(PlannerOutcome::Planned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_renders_current_time() {
        let mut vars = HashMap::new();
        vars.insert("CURRENT_TIME".to_string(), "now".to_string());
        let rendered = prompt::render(DEFAULT_PROMPT, &vars);
        assert!(rendered.contains("now"));
        assert!(!rendered.contains("<<CURRENT_TIME>>"));
    }
}
