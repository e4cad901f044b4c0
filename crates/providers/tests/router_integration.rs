//! End-to-end exercise of [`LlmRouter`]'s role resolution and fallback
//! chain against stub providers — no network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use wk_domain::capability::{LlmCapabilities, ModelRole, ToolSupport};
use wk_domain::config::{FallbackConfig, RoleConfig};
use wk_domain::error::{Error, Result};
use wk_domain::message::Message;
use wk_domain::stream::{BoxStream, Chunk};
use wk_providers::{ChatRequest, ChatResponse, InvokeOptions, LlmProvider, LlmRouter, ProviderRegistry};

const CAPS: LlmCapabilities = LlmCapabilities {
    supports_tools: ToolSupport::Basic,
    supports_streaming: false,
    supports_json_mode: true,
    context_window_tokens: None,
};

struct AlwaysFails {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LlmProvider for AlwaysFails {
    async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Provider {
            provider: "flaky".into(),
            message: "HTTP 503 - upstream overloaded".into(),
        })
    }
    async fn chat_stream(&self, _req: &ChatRequest) -> Result<BoxStream<'static, Result<Chunk>>> {
        unimplemented!()
    }
    fn capabilities(&self) -> &LlmCapabilities {
        &CAPS
    }
    fn provider_id(&self) -> &str {
        "flaky"
    }
}

struct AlwaysSucceeds;

#[async_trait]
impl LlmProvider for AlwaysSucceeds {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        Ok(ChatResponse {
            content: format!("handled by steady (model={:?})", req.model),
            tool_calls: vec![],
            usage: None,
            model: "steady-model".into(),
            finish_reason: Some("stop".into()),
        })
    }
    async fn chat_stream(&self, _req: &ChatRequest) -> Result<BoxStream<'static, Result<Chunk>>> {
        unimplemented!()
    }
    fn capabilities(&self) -> &LlmCapabilities {
        &CAPS
    }
    fn provider_id(&self) -> &str {
        "steady"
    }
}

fn role_configs(fallback_model: &str) -> HashMap<String, RoleConfig> {
    let mut roles = HashMap::new();
    roles.insert(
        "basic".to_string(),
        RoleConfig {
            model: "flaky/whatever".into(),
            require_tools: false,
            require_json: false,
            fallbacks: vec![FallbackConfig {
                model: fallback_model.to_string(),
            }],
        },
    );
    roles
}

#[tokio::test]
async fn invoke_falls_back_to_next_provider_on_retriable_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
    providers.insert("flaky".into(), Arc::new(AlwaysFails { calls: calls.clone() }));
    providers.insert("steady".into(), Arc::new(AlwaysSucceeds));

    let registry = ProviderRegistry::from_providers(providers);
    let router = LlmRouter::new(registry, role_configs("steady/whatever"), 5_000, 0);

    let resp = router
        .invoke(ModelRole::Basic, vec![Message::user("hi")], &InvokeOptions::default())
        .await
        .expect("fallback provider should answer");

    assert!(resp.content.extract_all_text().contains("handled by steady"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invoke_fails_when_every_provider_in_the_chain_fails() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
    providers.insert("flaky".into(), Arc::new(AlwaysFails { calls: calls.clone() }));

    let registry = ProviderRegistry::from_providers(providers);
    // No fallback configured -- the only provider is the failing one.
    let mut roles = role_configs("flaky/whatever");
    roles.get_mut("basic").unwrap().fallbacks.clear();
    let router = LlmRouter::new(registry, roles, 5_000, 0);

    let err = router
        .invoke(ModelRole::Basic, vec![Message::user("hi")], &InvokeOptions::default())
        .await
        .expect_err("no provider can answer");

    assert!(err.to_string().contains("basic"));
}

#[tokio::test]
async fn invoke_errors_on_unconfigured_role() {
    let registry = ProviderRegistry::from_providers(HashMap::new());
    let router = LlmRouter::new(registry, HashMap::new(), 5_000, 0);

    let err = router
        .invoke(ModelRole::Reasoning, vec![Message::user("hi")], &InvokeOptions::default())
        .await
        .expect_err("reasoning role has no mapping");

    assert!(err.to_string().contains("reasoning"));
}
