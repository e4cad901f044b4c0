//! Coordinator node: the graph's entry point. Talks small-talk directly to
//! the caller, or silently hands off to the planner when the LLM's
//! response carries the handoff token. Allocates the task id on first
//! entry. Buffers a lookahead window of streamed chunks before deciding
//! whether to surface them or suppress them in favor of a silent handoff
//! (see DESIGN.md decision 2 for why the buffer exists).

use std::collections::HashMap;

use futures_util::StreamExt;
use uuid::Uuid;

use wk_artifacts::ArtifactStore;
use wk_domain::capability::ModelRole;
use wk_domain::error::Result;
use wk_domain::event::Event;
use wk_domain::message::Message;
use wk_domain::state::SessionState;
use wk_domain::task::TaskId;
use wk_providers::{InvokeOptions, LlmRouter};

use crate::bus::EventBus;
use crate::cancel::CancelToken;
use crate::nodes::HANDOFF_TOKEN;
use crate::prompt;

const DEFAULT_PROMPT: &str = "You are the coordinator of a multi-agent workflow. \
    The current time is <<CURRENT_TIME>>. \
    Greet small talk directly. If the user's request requires research, coding, \
    database analysis, document parsing, chart generation, or reporting, respond \
    with exactly the token `handoff_to_planner` and nothing else.";

pub enum CoordinatorOutcome {
    /// The task ended here; nothing more to do.
    Ended,
    /// The coordinator confirmed handoff; the graph should continue to the
    /// planner.
    HandoffToPlanner,
}

/// Run the coordinator turn. On first entry, allocates the task id and
/// creates its artifact directory (idempotent thereafter).
pub async fn run(
    state: &mut SessionState,
    router: &LlmRouter,
    artifacts: &ArtifactStore,
    events: &EventBus,
    cancel: &CancelToken,
    buffer_chunks: usize,
) -> Result<CoordinatorOutcome> {
    if state.task_id.is_none() {
        let task_id = TaskId::new();
        let dir = artifacts.create(&task_id)?;
        state.set_task(task_id, dir);
    }

    let mut vars = HashMap::new();
    vars.insert("CURRENT_TIME".to_string(), prompt::current_time());
    let system_prompt = prompt::render(DEFAULT_PROMPT, &vars);

    let mut messages = Vec::with_capacity(state.messages.len() + 1);
    messages.push(Message::system(system_prompt));
    messages.extend_from_slice(&state.messages);

    if !events
        .send(Event::StartOfLlm { agent_name: "coordinator".into() }, cancel)
        .await
    {
        return Ok(CoordinatorOutcome::Ended);
    }

    let opts = InvokeOptions::default();
    let mut stream = router.stream(ModelRole::Basic, messages, &opts).await?;

    let mut buffer = Vec::with_capacity(buffer_chunks);
    let mut buffered_text = String::new();
    let mut handoff_detected = false;

    while buffer.len() < buffer_chunks {
        if cancel.is_cancelled() {
            return Ok(CoordinatorOutcome::Ended);
        }
        let Some(chunk) = stream.next().await else { break };
        let chunk = chunk?;
        if let Some(content) = &chunk.content {
            buffered_text.push_str(content);
        }
        buffer.push(chunk);
    }

    if buffered_text.contains(HANDOFF_TOKEN) || buffered_text.contains("```") {
        handoff_detected = true;
    }

    let _ = events.send(Event::EndOfLlm { agent_name: "coordinator".into() }, cancel).await;

    if handoff_detected {
        return Ok(CoordinatorOutcome::HandoffToPlanner);
    }

    for chunk in buffer {
        if chunk.is_empty() {
            continue;
        }
        if !events
            .send(
                Event::Message {
                    message_id: Uuid::new_v4().to_string(),
                    delta: wk_domain::event::MessageDelta {
                        content: chunk.content,
                        reasoning_content: chunk.reasoning_content,
                    },
                },
                cancel,
            )
            .await
        {
            return Ok(CoordinatorOutcome::Ended);
        }
    }

    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Ok(CoordinatorOutcome::Ended);
        }
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        if !events
            .send(
                Event::Message {
                    message_id: Uuid::new_v4().to_string(),
                    delta: wk_domain::event::MessageDelta {
                        content: chunk.content,
                        reasoning_content: chunk.reasoning_content,
                    },
                },
                cancel,
            )
            .await
        {
            return Ok(CoordinatorOutcome::Ended);
        }
    }

    Ok(CoordinatorOutcome::Ended)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handoff_token_detection_is_substring_match() {
        assert!("blah handoff_to_planner blah".contains(HANDOFF_TOKEN));
        assert!(!"just chatting".contains(HANDOFF_TOKEN));
    }
}
