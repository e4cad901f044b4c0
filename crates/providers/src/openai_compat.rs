//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, DeepSeek, Qwen (DashScope compatible-mode), Ollama,
//! and any other endpoint that follows the OpenAI chat completions contract.

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use serde_json::Value;
use wk_domain::capability::{LlmCapabilities, ToolSupport};
use wk_domain::config::ProviderConfig;
use wk_domain::error::{Error, Result};
use wk_domain::message::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use wk_domain::stream::{BoxStream, Chunk, Usage};

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let default_model = cfg
            .default_model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".into());

        let capabilities = LlmCapabilities {
            supports_tools: ToolSupport::StrictJson,
            supports_streaming: true,
            supports_json_mode: true,
            context_window_tokens: Some(128_000),
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
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model.clone().unwrap_or_else(|| self.default_model.clone())
    }

    fn build_chat_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
            "stream": stream,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if req.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }
}

// ── Message serialization ────────────────────────────────────────────

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        // Worker-response messages re-enter history as named user turns
        // (see Message::worker_response); a bare user message is the same
        // wire role either way.
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => tool_result_to_openai(msg),
        Role::Assistant => assistant_to_openai(msg),
        _ => {
            let text = msg.content.extract_all_text();
            serde_json::json!({
                "role": role_to_str(msg.role),
                "content": text,
            })
        }
    }
}

fn assistant_to_openai(msg: &Message) -> Value {
    let mut obj = serde_json::json!({"role": "assistant"});
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    match &msg.content {
        MessageContent::Text(t) => text_parts.push(t.clone()),
        MessageContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => text_parts.push(text.clone()),
                    ContentPart::ToolUse { id, name, input } => {
                        tool_calls.push(serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": { "name": name, "arguments": input.to_string() }
                        }));
                    }
                    _ => {}
                }
            }
        }
    }

    obj["content"] = if text_parts.is_empty() {
        Value::Null
    } else {
        Value::String(text_parts.join("\n"))
    };
    if !tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
}

fn tool_result_to_openai(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Parts(parts) => {
            for part in parts {
                if let ContentPart::ToolResult { tool_use_id, content, .. } = part {
                    return serde_json::json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    });
                }
            }
            serde_json::json!({"role": "tool", "tool_call_id": "", "content": ""})
        }
        MessageContent::Text(t) => serde_json::json!({
            "role": "tool",
            "tool_call_id": "",
            "content": t,
        }),
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ── Response parsing ─────────────────────────────────────────────────

fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: "openai_compat".into(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Provider {
        provider: "openai_compat".into(),
        message: "no message in choice".into(),
    })?;

    let content = message.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let finish_reason = choice.get("finish_reason").and_then(|v| v.as_str()).map(String::from);
    let model = body.get("model").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
    let tool_calls = parse_openai_tool_calls(message);
    let usage = body.get("usage").and_then(parse_openai_usage);

    Ok(ChatResponse { content, tool_calls, usage, model, finish_reason })
}

fn parse_openai_tool_calls(message: &Value) -> Vec<ToolCall> {
    let arr = match message.get("tool_calls").and_then(|v| v.as_array()) {
        Some(a) => a,
        None => return Vec::new(),
    };
    arr.iter()
        .filter_map(|tc| {
            let call_id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let tool_name = func.get("name")?.as_str()?.to_string();
            let args_str = func.get("arguments")?.as_str().unwrap_or("{}");
            let arguments: Value = serde_json::from_str(args_str).unwrap_or(Value::Object(Default::default()));
            Some(ToolCall { call_id, tool_name, arguments })
        })
        .collect()
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

// ── SSE chunk parsing ────────────────────────────────────────────────

fn parse_sse_data_vec(data: &str) -> Vec<Result<Chunk>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(Chunk { id: String::new(), content: None, reasoning_content: None, done: true, usage: None })];
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let id = v.get("id").and_then(|x| x.as_str()).unwrap_or("").to_string();
    let choice = v.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first());

    let choice = match choice {
        Some(c) => c,
        None => {
            if let Some(usage) = v.get("usage").and_then(parse_openai_usage) {
                return vec![Ok(Chunk { id, content: None, reasoning_content: None, done: true, usage: Some(usage) })];
            }
            return Vec::new();
        }
    };

    let delta = choice.get("delta").unwrap_or(&Value::Null);
    let content = delta.get("content").and_then(|v| v.as_str()).map(str::to_string);
    let reasoning_content = delta.get("reasoning_content").and_then(|v| v.as_str()).map(str::to_string);

    let finish_reason = choice.get("finish_reason").and_then(|v| v.as_str());
    if finish_reason.is_some() {
        let usage = v.get("usage").and_then(parse_openai_usage);
        return vec![Ok(Chunk { id, content, reasoning_content, done: true, usage })];
    }

    if content.is_none() && reasoning_content.is_none() {
        return Vec::new();
    }
    vec![Ok(Chunk { id, content, reasoning_content, done: false, usage: None })]
}

// ── Trait implementation ─────────────────────────────────────────────

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(req, false);

        tracing::debug!(provider = %self.id, url = %url, "openai_compat chat request");

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
        parse_chat_response(&resp_json)
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<Chunk>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(req, true);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "openai_compat stream request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: provider_id,
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        Ok(crate::sse::sse_response_stream(resp, parse_sse_data_vec))
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
    fn parses_finish_reason_as_done_chunk() {
        let data = r#"{"id":"c1","choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let chunks = parse_sse_data_vec(data);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].as_ref().unwrap().done);
    }

    #[test]
    fn parses_content_delta() {
        let data = r#"{"id":"c1","choices":[{"delta":{"content":"hi"}}]}"#;
        let chunks = parse_sse_data_vec(data);
        assert_eq!(chunks[0].as_ref().unwrap().content.as_deref(), Some("hi"));
    }

    #[test]
    fn skips_empty_delta_chunks() {
        let data = r#"{"id":"c1","choices":[{"delta":{}}]}"#;
        assert!(parse_sse_data_vec(data).is_empty());
    }

    #[test]
    fn done_sentinel_emits_terminal_chunk() {
        let chunks = parse_sse_data_vec("[DONE]");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].as_ref().unwrap().done);
    }
}
