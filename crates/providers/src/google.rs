//! Google Gemini adapter.
//!
//! Implements the Gemini `generateContent` and `streamGenerateContent` APIs.
//! Auth is via an API key passed as a query parameter (`key={api_key}`).

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use serde_json::Value;
use wk_domain::capability::{LlmCapabilities, ToolSupport};
use wk_domain::config::ProviderConfig;
use wk_domain::error::{Error, Result};
use wk_domain::message::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use wk_domain::stream::{BoxStream, Chunk, Usage};

pub struct GoogleProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let default_model = cfg.default_model.clone().unwrap_or_else(|| "gemini-2.0-flash".into());

        let capabilities = LlmCapabilities {
            supports_tools: ToolSupport::Basic,
            supports_streaming: true,
            supports_json_mode: true,
            context_window_tokens: Some(1_000_000),
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

    fn generate_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent?key={}", self.base_url, model, self.api_key)
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, model, self.api_key
        )
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let mut contents: Vec<Value> = Vec::new();
        let mut system_instruction: Option<Value> = None;

        for msg in &req.messages {
            match msg.role {
                Role::System => {
                    let text = msg.content.extract_all_text();
                    system_instruction = Some(serde_json::json!({"parts": [{"text": text}]}));
                }
                Role::User => contents.push(user_to_gemini(msg)),
                Role::Assistant => contents.push(assistant_to_gemini(msg)),
                Role::Tool => contents.push(tool_result_to_gemini(msg)),
            }
        }

        let mut body = serde_json::json!({"contents": contents});

        if let Some(si) = system_instruction {
            body["systemInstruction"] = si;
        }
        if !req.tools.is_empty() {
            let function_declarations: Vec<Value> = req.tools.iter().map(tool_to_gemini).collect();
            body["tools"] = serde_json::json!([{"functionDeclarations": function_declarations}]);
        }

        let mut gen_config = serde_json::json!({});
        if let Some(temp) = req.temperature {
            gen_config["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            gen_config["maxOutputTokens"] = serde_json::json!(max);
        }
        if req.json_mode {
            gen_config["responseMimeType"] = serde_json::json!("application/json");
        }
        if gen_config.as_object().is_some_and(|o| !o.is_empty()) {
            body["generationConfig"] = gen_config;
        }

        body
    }
}

// ── Message serialization ────────────────────────────────────────────

fn user_to_gemini(msg: &Message) -> Value {
    serde_json::json!({"role": "user", "parts": content_to_gemini_parts(&msg.content)})
}

fn assistant_to_gemini(msg: &Message) -> Value {
    let mut parts: Vec<Value> = Vec::new();
    match &msg.content {
        MessageContent::Text(t) => parts.push(serde_json::json!({"text": t})),
        MessageContent::Parts(ps) => {
            for p in ps {
                match p {
                    ContentPart::Text { text } => parts.push(serde_json::json!({"text": text})),
                    ContentPart::ToolUse { name, input, .. } => {
                        parts.push(serde_json::json!({"functionCall": {"name": name, "args": input}}));
                    }
                    _ => {}
                }
            }
        }
    }
    serde_json::json!({"role": "model", "parts": parts})
}

fn tool_result_to_gemini(msg: &Message) -> Value {
    let mut parts: Vec<Value> = Vec::new();
    match &msg.content {
        MessageContent::Parts(ps) => {
            for p in ps {
                if let ContentPart::ToolResult { tool_use_id, content, .. } = p {
                    parts.push(serde_json::json!({
                        "functionResponse": { "name": tool_use_id, "response": { "content": content } }
                    }));
                }
            }
        }
        MessageContent::Text(t) => {
            parts.push(serde_json::json!({
                "functionResponse": { "name": "unknown", "response": { "content": t } }
            }));
        }
    }
    serde_json::json!({"role": "user", "parts": parts})
}

fn content_to_gemini_parts(content: &MessageContent) -> Vec<Value> {
    match content {
        MessageContent::Text(t) => vec![serde_json::json!({"text": t})],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(serde_json::json!({"text": text})),
                ContentPart::ImageUrl { url } => Some(serde_json::json!({
                    "inlineData": { "mimeType": "image/png", "data": url }
                })),
                _ => None,
            })
            .collect(),
    }
}

fn tool_to_gemini(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "parameters": tool.parameters,
    })
}

// ── Response parsing ─────────────────────────────────────────────────

fn parse_gemini_response(body: &Value, model: &str) -> Result<ChatResponse> {
    let candidate = body
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider { provider: "google".into(), message: "no candidates in response".into() })?;

    let parts = candidate.get("content").and_then(|c| c.get("parts")).and_then(|p| p.as_array());

    let mut text_content = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    if let Some(parts) = parts {
        for part in parts {
            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                text_content.push_str(text);
            }
            if let Some(fc) = part.get("functionCall") {
                let tool_name = fc.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
                let arguments = fc.get("args").cloned().unwrap_or(Value::Object(Default::default()));
                tool_calls.push(ToolCall { call_id: format!("call_{}", uuid::Uuid::new_v4()), tool_name, arguments });
            }
        }
    }

    let finish_reason = candidate.get("finishReason").and_then(|v| v.as_str()).map(normalize_finish_reason);
    let usage = body.get("usageMetadata").and_then(parse_gemini_usage);

    Ok(ChatResponse { content: text_content, tool_calls, usage, model: model.to_string(), finish_reason })
}

fn normalize_finish_reason(s: &str) -> String {
    match s {
        "STOP" => "stop".to_string(),
        "MAX_TOKENS" => "length".to_string(),
        other => other.to_lowercase(),
    }
}

fn parse_gemini_usage(v: &Value) -> Option<Usage> {
    let prompt = v.get("promptTokenCount")?.as_u64()? as u32;
    let completion = v.get("candidatesTokenCount").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let total = v.get("totalTokenCount").and_then(|v| v.as_u64()).unwrap_or((prompt + completion) as u64) as u32;
    Some(Usage { prompt_tokens: prompt, completion_tokens: completion, total_tokens: total })
}

// ── Streaming ─────────────────────────────────────────────────────────

/// Gemini streams whole candidates per SSE event rather than token deltas;
/// tool calls surface only on the non-streaming `chat()` path.
fn parse_gemini_sse_data(data: &str) -> Vec<Result<Chunk>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let candidate = match v.get("candidates").and_then(|c| c.as_array()).and_then(|a| a.first()) {
        Some(c) => c,
        None => return Vec::new(),
    };

    let mut text = String::new();
    if let Some(parts) = candidate.get("content").and_then(|c| c.get("parts")).and_then(|p| p.as_array()) {
        for part in parts {
            if let Some(t) = part.get("text").and_then(|v| v.as_str()) {
                text.push_str(t);
            }
        }
    }

    let finish_reason = candidate.get("finishReason").and_then(|v| v.as_str());
    if let Some(fr) = finish_reason {
        let usage = v.get("usageMetadata").and_then(parse_gemini_usage);
        let _ = normalize_finish_reason(fr);
        return vec![Ok(Chunk {
            id: String::new(),
            content: if text.is_empty() { None } else { Some(text) },
            reasoning_content: None,
            done: true,
            usage,
        })];
    }

    if text.is_empty() {
        return Vec::new();
    }
    vec![Ok(Chunk { id: String::new(), content: Some(text), reasoning_content: None, done: false, usage: None })]
}

/// Redact the `key=` query parameter from a URL for safe logging.
fn redact_url_key(url: &str) -> String {
    if let Some(idx) = url.find("key=") {
        let prefix = &url[..idx + 4];
        let rest = &url[idx + 4..];
        let end = rest.find('&').unwrap_or(rest.len());
        format!("{prefix}[REDACTED]{}", &rest[end..])
    } else {
        url.to_string()
    }
}

#[async_trait::async_trait]
impl LlmProvider for GoogleProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());
        let url = self.generate_url(&model);
        let body = self.build_body(req);

        tracing::debug!(provider = %self.id, url = %redact_url_key(&url), "google chat request");

        let resp = self.client.post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_gemini_response(&resp_json, &model)
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<Chunk>>> {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());
        let url = self.stream_url(&model);
        let body = self.build_body(req);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %redact_url_key(&url), "google stream request");

        let resp = self.client.post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: provider_id,
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        Ok(crate::sse::sse_response_stream(resp, parse_gemini_sse_data))
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
    fn redacts_api_key_from_url() {
        let url = "https://example.com/v1beta/models/gemini:generateContent?key=SECRET123&alt=sse";
        assert_eq!(redact_url_key(url), "https://example.com/v1beta/models/gemini:generateContent?key=[REDACTED]&alt=sse");
    }

    #[test]
    fn finish_reason_sets_done() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]},"finishReason":"STOP"}]}"#;
        let chunks = parse_gemini_sse_data(data);
        assert_eq!(chunks.len(), 1);
        let c = chunks[0].as_ref().unwrap();
        assert!(c.done);
        assert_eq!(c.content.as_deref(), Some("hi"));
    }

    #[test]
    fn plain_text_delta_not_done() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"partial"}]}}]}"#;
        let chunks = parse_gemini_sse_data(data);
        assert!(!chunks[0].as_ref().unwrap().done);
    }
}
