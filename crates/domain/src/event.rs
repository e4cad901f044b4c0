use serde::{Deserialize, Serialize};

use crate::task::TaskId;
use crate::worker::WorkerName;

/// A single step in a validated plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub worker_name: String,
    pub description: String,
}

/// One plan step as surfaced in a `plan_generated`/`step_started` event
/// payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInfo {
    pub worker_name: String,
    pub description: String,
}

/// Delta payload of a `message` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

/// A small tagged record delivered to the caller. Ten variants, each
/// carrying exactly the payload its wire name implies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    #[serde(rename = "start_of_workflow")]
    StartOfWorkflow {
        workflow_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        input: Option<serde_json::Value>,
    },
    #[serde(rename = "end_of_workflow")]
    EndOfWorkflow {
        workflow_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        messages: Option<serde_json::Value>,
    },
    #[serde(rename = "start_of_agent")]
    StartOfAgent { agent_name: String, agent_id: String },
    #[serde(rename = "end_of_agent")]
    EndOfAgent { agent_name: String, agent_id: String },
    #[serde(rename = "start_of_llm")]
    StartOfLlm { agent_name: String },
    #[serde(rename = "end_of_llm")]
    EndOfLlm { agent_name: String },
    #[serde(rename = "message")]
    Message {
        message_id: String,
        delta: MessageDelta,
    },
    #[serde(rename = "tool_call")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        tool_input: serde_json::Value,
    },
    #[serde(rename = "tool_call_result")]
    ToolCallResult {
        tool_call_id: String,
        tool_name: String,
        tool_result: serde_json::Value,
    },
    #[serde(rename = "plan_generated")]
    PlanGenerated {
        plan_steps: Vec<StepInfo>,
        total_steps: usize,
    },
    #[serde(rename = "step_started")]
    StepStarted {
        step_index: usize,
        total_steps: usize,
        step_info: StepInfo,
    },
    #[serde(rename = "step_end")]
    StepEnd {
        step_index: usize,
        total_steps: usize,
        step_info: StepInfo,
    },
}

impl Event {
    pub fn agent_name_of_start(&self) -> Option<&str> {
        match self {
            Event::StartOfAgent { agent_name, .. } => Some(agent_name),
            _ => None,
        }
    }

    /// The wire payload for this event, with the `{"event":..,"data":..}`
    /// envelope `#[serde(tag, content)]` adds for internal (de)serialization
    /// stripped back off — this is what actually goes out as the SSE
    /// `data:` line; `kind()` supplies the `event:` line separately.
    pub fn payload_json(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.get("data").cloned())
            .unwrap_or(serde_json::Value::Null)
    }

    /// Human-readable kind name, used for pairing-invariant bookkeeping in
    /// tests and for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::StartOfWorkflow { .. } => "start_of_workflow",
            Event::EndOfWorkflow { .. } => "end_of_workflow",
            Event::StartOfAgent { .. } => "start_of_agent",
            Event::EndOfAgent { .. } => "end_of_agent",
            Event::StartOfLlm { .. } => "start_of_llm",
            Event::EndOfLlm { .. } => "end_of_llm",
            Event::Message { .. } => "message",
            Event::ToolCall { .. } => "tool_call",
            Event::ToolCallResult { .. } => "tool_call_result",
            Event::PlanGenerated { .. } => "plan_generated",
            Event::StepStarted { .. } => "step_started",
            Event::StepEnd { .. } => "step_end",
        }
    }
}

pub fn worker_to_step_info(name: WorkerName, step: &Step) -> StepInfo {
    StepInfo {
        worker_name: name.as_str().to_string(),
        description: step.description.clone(),
    }
}

/// Convenience: a freshly allocated workflow id, used by the facade (C7).
pub fn new_workflow_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Re-exported for callers that want to thread a `TaskId` alongside events
/// without importing `crate::task` separately.
pub type EventTaskId = TaskId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_json_strips_the_tag_envelope() {
        let event = Event::Message {
            message_id: "m1".into(),
            delta: MessageDelta { content: Some("hi".into()), reasoning_content: None },
        };
        let payload = event.payload_json();
        assert_eq!(payload["message_id"], "m1");
        assert_eq!(payload["delta"]["content"], "hi");
        assert!(payload.get("event").is_none());
        assert!(payload.get("data").is_none());
    }
}
