use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider system
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_20000u")]
    pub default_timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
    /// Startup policy for LLM providers.
    ///
    /// - `allow_none`: the process boots even if zero providers initialize;
    ///   roles resolving to a missing provider fail lazily on first use.
    /// - `require_one` (default): abort startup if no provider initializes.
    #[serde(default)]
    pub startup_policy: LlmStartupPolicy,
    /// Role -> model mapping. Exactly two roles are meaningful to the
    /// kernel (`basic`, `reasoning`) but the map is open so a deployment
    /// can add more without a code change.
    #[serde(default)]
    pub roles: HashMap<String, RoleConfig>,
    /// Registered LLM providers (data-driven: adding a provider = adding
    /// config, no new adapter code).
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 20_000,
            max_retries: 2,
            startup_policy: LlmStartupPolicy::RequireOne,
            roles: HashMap::new(),
            providers: Vec::new(),
        }
    }
}

/// Controls how the gateway handles LLM provider initialization at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    /// The process boots even if no LLM providers initialize; roles that
    /// resolve to a missing provider fail lazily, on first use.
    AllowNone,
    /// Abort startup if no LLM providers successfully initialize.
    #[default]
    RequireOne,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Format: "provider_id/model_name".
    pub model: String,
    #[serde(default)]
    pub require_tools: bool,
    #[serde(default)]
    pub require_json: bool,
    #[serde(default)]
    pub fallbacks: Vec<FallbackConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenaiCompat,
    Anthropic,
    Google,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Env var containing the API key. Resolved at provider-init time;
    /// never logged, never echoed by `config show`.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (config-only setups / tests); prefer `env` otherwise.
    #[serde(default)]
    pub key: Option<String>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_20000u() -> u64 {
    20_000
}
fn d_2() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_config_default_requires_one_provider() {
        let config = LlmConfig::default();
        assert_eq!(config.startup_policy, LlmStartupPolicy::RequireOne);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn provider_config_deserializes_with_env_auth() {
        let json = r#"{
            "id": "openai",
            "kind": "openai_compat",
            "base_url": "https://api.openai.com/v1",
            "auth": { "env": "OPENAI_API_KEY" },
            "default_model": "gpt-4o-mini"
        }"#;
        let pc: ProviderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(pc.kind, ProviderKind::OpenaiCompat);
        assert_eq!(pc.auth.env.as_deref(), Some("OPENAI_API_KEY"));
    }

    #[test]
    fn role_config_fallbacks_default_to_empty() {
        let json = r#"{ "model": "openai/gpt-4o-mini" }"#;
        let rc: RoleConfig = serde_json::from_str(json).unwrap();
        assert!(rc.fallbacks.is_empty());
    }
}
