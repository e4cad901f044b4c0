//! Supervisor node: decides which worker acts next, or `FINISH`. An
//! unparseable or unknown `next` value is forced to `FINISH` rather than
//! left to propagate as an error.

use std::collections::HashMap;

use wk_domain::capability::ModelRole;
use wk_domain::error::Result;
use wk_domain::message::Message;
use wk_domain::state::SessionState;
use wk_domain::worker::RouteDecision;
use wk_providers::LlmRouter;

use crate::prompt;

const DEFAULT_PROMPT: &str = "You are the supervisor of a multi-agent workflow. \
    The current time is <<CURRENT_TIME>>. \
    Given the plan and the conversation so far, decide which worker should act \
    next, or FINISH if the task is complete. Respond with JSON of the form \
    {\"next\": <worker_name>|\"FINISH\"}.";

const ROUTING_SCHEMA_HINT: &str = r#"{"next": "researcher|coder|db_analyst|document_parser|chart_generator|reporter|FINISH"}"#;

/// Ask the LLM for a routing decision. An unparseable or unregistered
/// worker name is forced to [`RouteDecision::Finish`], per the error table.
pub async fn run(state: &SessionState, router: &LlmRouter) -> Result<RouteDecision> {
    let mut vars = HashMap::new();
    vars.insert("CURRENT_TIME".to_string(), prompt::current_time());
    let system_prompt = prompt::render(DEFAULT_PROMPT, &vars);

    let mut messages = Vec::with_capacity(state.messages.len() + 1);
    messages.push(Message::system(system_prompt));
    messages.extend_from_slice(&state.messages);

    let schema_hint: serde_json::Value = serde_json::from_str(ROUTING_SCHEMA_HINT).expect("static schema is valid json");
    let routed = router.invoke_structured(ModelRole::Basic, messages, &schema_hint).await;

    let decision = match routed {
        Ok(value) => value
            .get("next")
            .and_then(|v| v.as_str())
            .and_then(RouteDecision::parse),
        Err(_) => None,
    };

    Ok(decision.unwrap_or(RouteDecision::Finish))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_schema_hint_is_valid_json() {
        let v: serde_json::Value = serde_json::from_str(ROUTING_SCHEMA_HINT).unwrap();
        assert!(v.get("next").is_some());
    }
}
