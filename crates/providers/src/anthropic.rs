//! Anthropic-native adapter.
//!
//! Implements the Anthropic Messages API including tool use and streaming,
//! and the Anthropic-specific message structure where system messages go in
//! a separate top-level `system` field.

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use serde_json::Value;
use wk_domain::capability::{LlmCapabilities, ToolSupport};
use wk_domain::config::ProviderConfig;
use wk_domain::error::{Error, Result};
use wk_domain::message::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use wk_domain::stream::{BoxStream, Chunk, Usage};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let default_model = cfg
            .default_model
            .clone()
            .unwrap_or_else(|| "claude-sonnet-4-20250514".into());

        let capabilities = LlmCapabilities {
            supports_tools: ToolSupport::StrictJson,
            supports_streaming: true,
            supports_json_mode: false,
            context_window_tokens: Some(200_000),
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            capabilities,
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn build_messages_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());

        let mut system_parts: Vec<String> = Vec::new();
        let mut api_messages: Vec<Value> = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.extract_all_text()),
                Role::User => api_messages.push(user_msg_to_anthropic(msg)),
                Role::Assistant => api_messages.push(assistant_msg_to_anthropic(msg)),
                Role::Tool => api_messages.push(tool_result_to_anthropic(msg)),
            }
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
            "stream": stream,
        });

        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body["max_tokens"] = serde_json::json!(req.max_tokens.unwrap_or(4096));

        body
    }
}

// ── Message serialization ────────────────────────────────────────────

fn user_msg_to_anthropic(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Text(t) => serde_json::json!({"role": "user", "content": t}),
        MessageContent::Parts(parts) => {
            let content: Vec<Value> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(serde_json::json!({"type": "text", "text": text})),
                    ContentPart::ImageUrl { url } => Some(serde_json::json!({
                        "type": "image",
                        "source": { "type": "url", "url": url }
                    })),
                    _ => None,
                })
                .collect();
            serde_json::json!({"role": "user", "content": content})
        }
    }
}

fn assistant_msg_to_anthropic(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Text(t) => serde_json::json!({
            "role": "assistant",
            "content": [{"type": "text", "text": t}],
        }),
        MessageContent::Parts(parts) => {
            let content: Vec<Value> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(serde_json::json!({"type": "text", "text": text})),
                    ContentPart::ToolUse { id, name, input } => Some(serde_json::json!({
                        "type": "tool_use", "id": id, "name": name, "input": input,
                    })),
                    _ => None,
                })
                .collect();
            serde_json::json!({"role": "assistant", "content": content})
        }
    }
}

fn tool_result_to_anthropic(msg: &Message) -> Value {
    let content: Vec<Value> = match &msg.content {
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolResult { tool_use_id, content, is_error } => Some(serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": tool_use_id,
                    "content": content,
                    "is_error": is_error,
                })),
                _ => None,
            })
            .collect(),
        MessageContent::Text(t) => vec![serde_json::json!({
            "type": "tool_result", "tool_use_id": "", "content": t,
        })],
    };
    serde_json::json!({"role": "user", "content": content})
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

// ── Response parsing ─────────────────────────────────────────────────

fn parse_anthropic_response(body: &Value) -> Result<ChatResponse> {
    let content_arr = body.get("content").and_then(|v| v.as_array()).cloned().unwrap_or_default();

    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in &content_arr {
        match block.get("type").and_then(|v| v.as_str()).unwrap_or("") {
            "text" => {
                if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                    text_parts.push(t.to_string());
                }
            }
            "tool_use" => {
                let call_id = block.get("id").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let tool_name = block.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let arguments = block.get("input").cloned().unwrap_or(Value::Object(Default::default()));
                tool_calls.push(ToolCall { call_id, tool_name, arguments });
            }
            _ => {}
        }
    }

    let model = body.get("model").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
    let finish_reason = body.get("stop_reason").and_then(|v| v.as_str()).map(normalize_stop_reason);
    let usage = body.get("usage").and_then(parse_anthropic_usage);

    Ok(ChatResponse { content: text_parts.join(""), tool_calls, usage, model, finish_reason })
}

fn normalize_stop_reason(s: &str) -> String {
    match s {
        "end_turn" => "stop".to_string(),
        "tool_use" => "tool_calls".to_string(),
        other => other.to_string(),
    }
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens")?.as_u64()? as u32;
    let output = v.get("output_tokens")?.as_u64()? as u32;
    Some(Usage { prompt_tokens: input, completion_tokens: output, total_tokens: input + output })
}

// ── Streaming ─────────────────────────────────────────────────────────

/// Only text deltas are surfaced as `Chunk`s. Tool calls can only be
/// observed on the non-streaming `chat()` path (see [`LlmProvider`]).
struct StreamState {
    usage: Option<Usage>,
    done_emitted: bool,
}

impl StreamState {
    fn new() -> Self {
        Self { usage: None, done_emitted: false }
    }
}

fn parse_anthropic_sse(data: &str, state: &mut StreamState) -> Vec<Result<Chunk>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    match v.get("type").and_then(|v| v.as_str()).unwrap_or("") {
        "message_start" => {
            if let Some(msg) = v.get("message") {
                state.usage = msg.get("usage").and_then(parse_anthropic_usage);
            }
            Vec::new()
        }
        "content_block_delta" => {
            let delta = v.get("delta");
            let text = delta
                .and_then(|d| d.get("type"))
                .and_then(|v| v.as_str())
                .filter(|t| *t == "text_delta")
                .and_then(|_| delta.and_then(|d| d.get("text")).and_then(|v| v.as_str()));
            match text {
                Some(t) if !t.is_empty() => vec![Ok(Chunk {
                    id: String::new(),
                    content: Some(t.to_string()),
                    reasoning_content: None,
                    done: false,
                    usage: None,
                })],
                _ => Vec::new(),
            }
        }
        "message_delta" => {
            if let Some(output) = v.get("usage").and_then(|u| u.get("output_tokens")).and_then(|v| v.as_u64()) {
                if let Some(ref mut u) = state.usage {
                    u.completion_tokens = output as u32;
                    u.total_tokens = u.prompt_tokens + u.completion_tokens;
                }
            }
            state.done_emitted = true;
            vec![Ok(Chunk {
                id: String::new(),
                content: None,
                reasoning_content: None,
                done: true,
                usage: state.usage,
            })]
        }
        "message_stop" if !state.done_emitted => {
            state.done_emitted = true;
            vec![Ok(Chunk { id: String::new(), content: None, reasoning_content: None, done: true, usage: state.usage })]
        }
        "error" => {
            let msg = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            vec![Err(Error::Provider { provider: "anthropic".into(), message: msg.to_string() })]
        }
        _ => Vec::new(),
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(req, false);

        tracing::debug!(provider = %self.id, url = %url, "anthropic chat request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_anthropic_response(&resp_json)
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<Chunk>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(req, true);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "anthropic stream request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: provider_id,
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        let mut state = StreamState::new();
        Ok(crate::sse::sse_response_stream(resp, move |data| parse_anthropic_sse(data, &mut state)))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta_produces_chunk() {
        let mut state = StreamState::new();
        let data = r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"hi"}}"#;
        let events = parse_anthropic_sse(data, &mut state);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().content.as_deref(), Some("hi"));
    }

    #[test]
    fn message_delta_emits_done() {
        let mut state = StreamState::new();
        let data = r#"{"type":"message_delta","usage":{"output_tokens":5}}"#;
        let events = parse_anthropic_sse(data, &mut state);
        assert!(events[0].as_ref().unwrap().done);
    }

    #[test]
    fn message_stop_emits_done_once() {
        let mut state = StreamState::new();
        state.done_emitted = true;
        let events = parse_anthropic_sse(r#"{"type":"message_stop"}"#, &mut state);
        assert!(events.is_empty());
    }

    #[test]
    fn stop_reason_normalized() {
        assert_eq!(normalize_stop_reason("end_turn"), "stop");
        assert_eq!(normalize_stop_reason("tool_use"), "tool_calls");
    }
}
