//! Capability-driven LLM router — the gateway's `invoke`/`stream`/
//! `invoke_structured` operations.
//!
//! The router resolves a [`ModelRole`] to a configured provider/model pair,
//! sends the request, and retries through the role's configured fallback
//! chain on transient failures. A provider instance is constructed once per
//! (role, provider) pair and cached behind a mutex-guarded map, matching the
//! "LLM Gateway instance cache" shared-resource policy.

use crate::registry::ProviderRegistry;
use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use wk_domain::capability::{LlmCapabilities, ModelRole, ToolSupport};
use wk_domain::config::{LlmConfig, RoleConfig};
use wk_domain::error::{Error, Result};
use wk_domain::message::{ContentPart, Message, MessageContent, ToolDefinition};
use wk_domain::stream::{BoxStream, Chunk};
use wk_domain::trace::TraceEvent;

/// Per-call options threaded into a single LLM Gateway invocation.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Clone)]
pub struct LlmRouter {
    registry: ProviderRegistry,
    role_configs: HashMap<String, RoleConfig>,
    default_timeout_ms: u64,
    max_retries: u32,
}

impl LlmRouter {
    pub fn from_config(llm_config: &LlmConfig) -> Result<Self> {
        let registry = ProviderRegistry::from_config(llm_config)?;
        Ok(Self {
            registry,
            role_configs: llm_config.roles.clone(),
            default_timeout_ms: llm_config.default_timeout_ms,
            max_retries: llm_config.max_retries,
        })
    }

    pub fn new(registry: ProviderRegistry, role_configs: HashMap<String, RoleConfig>, default_timeout_ms: u64, max_retries: u32) -> Self {
        Self { registry, role_configs, default_timeout_ms, max_retries }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Single-shot completion for `role`. Falls back through the role's
    /// configured fallback chain on retriable errors.
    pub async fn invoke(&self, role: ModelRole, messages: Vec<Message>, opts: &InvokeOptions) -> Result<Message> {
        let resp = self.chat_for_role(role, messages, opts, false).await?;
        Ok(Message::assistant(resp.content))
    }

    /// Streamed completion for `role`. Only the coordinator node streams;
    /// fallback does not apply mid-stream (a stream that starts sending
    /// chunks has already committed to a provider).
    pub async fn stream(&self, role: ModelRole, messages: Vec<Message>, opts: &InvokeOptions) -> Result<BoxStream<'static, Result<Chunk>>> {
        let role_str = role.as_str();
        let role_cfg = self
            .role_configs
            .get(role_str)
            .ok_or_else(|| Error::Config(format!("no role config for '{role_str}'")))?;

        let (provider_id, model_name) = resolve_model(&role_cfg.model);
        let provider = self
            .registry
            .get(provider_id)
            .ok_or_else(|| Error::Provider { provider: provider_id.into(), message: "provider not registered".into() })?;

        let req = build_request(messages, opts, Some(model_name.to_string()), false);
        tracing::debug!(provider = %provider_id, model = %model_name, role = %role_str, "stream invocation");
        provider.chat_stream(&req).await
    }

    /// Single-shot completion for `role` that surfaces the full response,
    /// tool calls included. Used by the Worker Runtime (C5) reason-act
    /// loop, which needs [`ChatResponse::tool_calls`] to decide whether to
    /// dispatch a tool or terminate the turn — `invoke` discards that field
    /// on its way to a plain [`Message`].
    pub async fn invoke_with_tools(&self, role: ModelRole, messages: Vec<Message>, opts: &InvokeOptions) -> Result<ChatResponse> {
        self.chat_for_role(role, messages, opts, false).await
    }

    /// Structured-output completion: requests JSON mode and returns the
    /// parsed value. Used by the supervisor's routing decision.
    pub async fn invoke_structured(&self, role: ModelRole, messages: Vec<Message>, schema_hint: &serde_json::Value) -> Result<serde_json::Value> {
        let mut opts = InvokeOptions::default();
        let _ = schema_hint; // the prompt itself carries the schema; providers only get json_mode
        let mut messages = messages;
        if let Some(last) = messages.last_mut() {
            let hint = format!("\n\nRespond with JSON matching this schema: {schema_hint}");
            match &mut last.content {
                MessageContent::Text(t) => t.push_str(&hint),
                MessageContent::Parts(parts) => {
                    parts.push(ContentPart::Text { text: hint });
                }
            }
        }
        opts.max_tokens = None;
        let resp = self.chat_for_role(role, messages, &opts, true).await?;
        serde_json::from_str(clean_json_fences(&resp.content)).map_err(Error::Json)
    }

    // ── Internal helpers ───────────────────────────────────────────

    async fn chat_for_role(&self, role: ModelRole, messages: Vec<Message>, opts: &InvokeOptions, json_mode: bool) -> Result<ChatResponse> {
        let role_str = role.as_str();
        let role_cfg = self
            .role_configs
            .get(role_str)
            .ok_or_else(|| Error::Config(format!("no role config for '{role_str}'")))?;

        let (provider_id, model_name) = resolve_model(&role_cfg.model);

        if let Some(provider) = self.registry.get(provider_id) {
            if Self::check_capabilities(provider.capabilities(), role_cfg) {
                let req = build_request(messages.clone(), opts, Some(model_name.to_string()), json_mode);
                match self.try_with_retries(&provider, &req, provider_id, model_name, &role_str.to_string()).await {
                    Ok(resp) => return Ok(resp),
                    Err(e) if Self::is_retriable(&e) => {
                        tracing::warn!(provider = %provider_id, model = %model_name, error = %e, "primary model failed, trying fallbacks");
                    }
                    Err(e) => return Err(e),
                }
            } else {
                tracing::warn!(provider = %provider_id, model = %model_name, "primary model does not satisfy required capabilities, trying fallbacks");
            }
        } else {
            tracing::warn!(provider = %provider_id, "primary provider not found in registry, trying fallbacks");
        }

        for fallback in &role_cfg.fallbacks {
            let (fb_provider_id, fb_model_name) = resolve_model(&fallback.model);
            let fb_provider = match self.registry.get(fb_provider_id) {
                Some(p) => p,
                None => continue,
            };
            if !Self::check_capabilities(fb_provider.capabilities(), role_cfg) {
                tracing::warn!(provider = %fb_provider_id, "fallback does not satisfy required capabilities, skipping");
                continue;
            }

            TraceEvent::LlmFallback {
                from_provider: provider_id.to_string(),
                from_model: model_name.to_string(),
                to_provider: fb_provider_id.to_string(),
                to_model: fb_model_name.to_string(),
                reason: "primary model failed or unavailable".to_string(),
            }
            .emit();

            let req = build_request(messages.clone(), opts, Some(fb_model_name.to_string()), json_mode);
            match self.try_with_retries(&fb_provider, &req, fb_provider_id, fb_model_name, &role_str.to_string()).await {
                Ok(resp) => return Ok(resp),
                Err(e) if Self::is_retriable(&e) => {
                    tracing::warn!(provider = %fb_provider_id, model = %fb_model_name, error = %e, "fallback model failed, trying next");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Provider {
            provider: "router".into(),
            message: format!("all models for role '{role_str}' failed or were unavailable"),
        })
    }

    /// Send a chat request with a timeout and an opt-in bounded-retry
    /// exponential backoff over the whitelisted retriable error categories.
    async fn try_with_retries(
        &self,
        provider: &Arc<dyn LlmProvider>,
        req: &ChatRequest,
        provider_id: &str,
        model_name: &str,
        role_str: &str,
    ) -> Result<ChatResponse> {
        let mut attempt = 0;
        loop {
            let start = Instant::now();
            let result = self.try_chat(provider, req).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(resp) => {
                    TraceEvent::LlmRequest {
                        provider: provider_id.to_string(),
                        model: model_name.to_string(),
                        role: role_str.to_string(),
                        streaming: false,
                        duration_ms,
                        prompt_tokens: resp.usage.as_ref().map(|u| u.prompt_tokens),
                        completion_tokens: resp.usage.as_ref().map(|u| u.completion_tokens),
                    }
                    .emit();
                    return result;
                }
                Err(e) if Self::is_retriable(e) && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff_ms = 200u64 * 2u64.pow(attempt.min(6));
                    tracing::warn!(provider = %provider_id, attempt, error = %e, backoff_ms, "retrying after transient error");
                    tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                    continue;
                }
                Err(_) => {
                    TraceEvent::LlmRequest {
                        provider: provider_id.to_string(),
                        model: model_name.to_string(),
                        role: role_str.to_string(),
                        streaming: false,
                        duration_ms,
                        prompt_tokens: None,
                        completion_tokens: None,
                    }
                    .emit();
                    return result;
                }
            }
        }
    }

    async fn try_chat(&self, provider: &Arc<dyn LlmProvider>, req: &ChatRequest) -> Result<ChatResponse> {
        let timeout = std::time::Duration::from_millis(self.default_timeout_ms);
        match tokio::time::timeout(timeout, provider.chat(req)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!("provider '{}' timed out after {}ms", provider.provider_id(), self.default_timeout_ms))),
        }
    }

    fn check_capabilities(cap: &LlmCapabilities, role_cfg: &RoleConfig) -> bool {
        if role_cfg.require_tools && cap.supports_tools == ToolSupport::None {
            return false;
        }
        if role_cfg.require_json && !cap.supports_json_mode {
            return false;
        }
        true
    }

    /// Retryable categories: transient 5xx, rate-limit (429), connection,
    /// and timeout errors. Anything else (bad request, auth, parse errors)
    /// is treated as fatal for the turn.
    fn is_retriable(err: &Error) -> bool {
        match err {
            Error::Timeout(_) => true,
            Error::Http(_) => true,
            Error::Provider { message, .. } => {
                message.contains("HTTP 429")
                    || message.contains("HTTP 500")
                    || message.contains("HTTP 502")
                    || message.contains("HTTP 503")
                    || message.contains("HTTP 504")
                    || message.contains("HTTP 529")
            }
            _ => false,
        }
    }
}

fn build_request(messages: Vec<Message>, opts: &InvokeOptions, model: Option<String>, json_mode: bool) -> ChatRequest {
    ChatRequest {
        messages,
        tools: opts.tools.clone(),
        temperature: opts.temperature,
        max_tokens: opts.max_tokens,
        json_mode,
        model,
    }
}

/// Strip common markdown code-fence wrappers (``` with optional language
/// tag) a model may wrap JSON output in despite `json_mode`.
fn clean_json_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Split a `"provider_id/model_name"` string into its two components.
pub fn resolve_model(model_str: &str) -> (&str, &str) {
    match model_str.split_once('/') {
        Some((provider, model)) => (provider, model),
        None => (model_str, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_model_splits_on_slash() {
        assert_eq!(resolve_model("openai/gpt-4o-mini"), ("openai", "gpt-4o-mini"));
    }

    #[test]
    fn resolve_model_without_slash_has_empty_model() {
        assert_eq!(resolve_model("openai"), ("openai", ""));
    }

    #[test]
    fn strips_fenced_json() {
        assert_eq!(clean_json_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn leaves_bare_json_unchanged() {
        assert_eq!(clean_json_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn retriable_on_timeout_and_5xx() {
        assert!(LlmRouter::is_retriable(&Error::Timeout("x".into())));
        assert!(LlmRouter::is_retriable(&Error::Provider { provider: "p".into(), message: "HTTP 503 - bad gateway".into() }));
        assert!(!LlmRouter::is_retriable(&Error::Provider { provider: "p".into(), message: "HTTP 400 - bad request".into() }));
    }
}
