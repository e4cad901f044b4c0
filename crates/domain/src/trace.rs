use serde::Serialize;

/// Structured trace events emitted across the kernel crates. Each variant
/// carries exactly the fields worth grepping for in production logs;
/// `emit()` serializes the event and logs it as one field on an `info`
/// span rather than string-interpolating it into the message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    NodeEntered {
        task_id: String,
        node: String,
        recursion_depth: u32,
    },
    NodeRouted {
        task_id: String,
        from_node: String,
        to_node: String,
    },
    LlmRequest {
        provider: String,
        model: String,
        role: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    LlmFallback {
        from_provider: String,
        from_model: String,
        to_provider: String,
        to_model: String,
        reason: String,
    },
    ToolInvoked {
        task_id: String,
        tool_name: String,
        duration_ms: u64,
        is_error: bool,
    },
    ArtifactWritten {
        task_id: String,
        kind: String,
        path: String,
    },
    ArtifactWriteFailed {
        task_id: String,
        kind: String,
        error: String,
    },
    RecursionCapHit {
        task_id: String,
        cap: u32,
    },
    TaskCancelled {
        task_id: String,
        at_node: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "kernel_event");
    }
}
