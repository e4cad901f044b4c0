pub mod llm;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use llm::{
    AuthConfig, FallbackConfig, LlmConfig, LlmStartupPolicy, ProviderConfig, ProviderKind,
    RoleConfig,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Root directory under which `<task_id>/` directories are created.
    #[serde(default = "d_artifacts_root")]
    pub root: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: d_artifacts_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Recursion ceiling on supervisor <-> worker cycles.
    #[serde(default = "d_recursion_cap")]
    pub recursion_cap: u32,
    /// Event Bus channel capacity.
    #[serde(default = "d_event_capacity")]
    pub event_channel_capacity: usize,
    /// Per-tool-call wall-clock timeout, milliseconds.
    #[serde(default = "d_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
    /// Per-worker-turn step cap — exceeding it is a fatal loop error.
    #[serde(default = "d_worker_step_cap")]
    pub worker_step_cap: u32,
    /// Coordinator streaming-filter lookahead, in chunks.
    #[serde(default = "d_coordinator_buffer")]
    pub coordinator_buffer_chunks: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recursion_cap: d_recursion_cap(),
            event_channel_capacity: d_event_capacity(),
            tool_timeout_ms: d_tool_timeout_ms(),
            worker_step_cap: d_worker_step_cap(),
            coordinator_buffer_chunks: d_coordinator_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: d_bind_addr(),
        }
    }
}

fn d_artifacts_root() -> PathBuf {
    PathBuf::from("docs/executions")
}
fn d_recursion_cap() -> u32 {
    50
}
fn d_event_capacity() -> usize {
    64
}
fn d_tool_timeout_ms() -> u64 {
    30_000
}
fn d_worker_step_cap() -> u32 {
    25
}
fn d_coordinator_buffer() -> usize {
    8
}
fn d_bind_addr() -> String {
    "127.0.0.1:8787".to_string()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.severity, self.message)
    }
}

impl Config {
    /// Validate the resolved configuration tree. Returns every problem
    /// found rather than stopping at the first one, so `config validate`
    /// and startup can report a complete summary in one pass.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.llm.providers.is_empty() {
            let severity = match self.llm.startup_policy {
                LlmStartupPolicy::RequireOne => ConfigSeverity::Error,
                LlmStartupPolicy::AllowNone => ConfigSeverity::Warning,
            };
            errors.push(ConfigError {
                severity,
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids = std::collections::HashSet::new();
        for p in &self.llm.providers {
            if !seen_ids.insert(p.id.clone()) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    message: format!("duplicate provider id: {}", p.id),
                });
            }
            if p.auth.env.is_none() && p.auth.key.is_none() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    message: format!("provider {} has no auth configured", p.id),
                });
            }
        }

        for role_name in ["basic", "reasoning"] {
            if !self.llm.roles.contains_key(role_name) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    message: format!("role '{role_name}' has no model mapping"),
                });
            }
        }
        for (role_name, role) in &self.llm.roles {
            let provider_id = role.model.split('/').next().unwrap_or_default();
            if !self.llm.providers.iter().any(|p| p.id == provider_id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    message: format!(
                        "role '{role_name}' references unknown provider '{provider_id}' (model '{}')",
                        role.model
                    ),
                });
            }
        }

        if self.engine.recursion_cap == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                message: "engine.recursion_cap must be greater than zero".into(),
            });
        }
        if self.engine.event_channel_capacity == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                message: "engine.event_channel_capacity must be greater than zero".into(),
            });
        }

        errors
    }

    pub fn has_fatal_errors(errors: &[ConfigError]) -> bool {
        errors.iter().any(|e| e.severity == ConfigSeverity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn minimal_valid_config() -> Config {
        let mut roles = HashMap::new();
        roles.insert(
            "basic".to_string(),
            RoleConfig {
                model: "openai/gpt-4o-mini".into(),
                require_tools: false,
                require_json: false,
                fallbacks: vec![],
            },
        );
        roles.insert(
            "reasoning".to_string(),
            RoleConfig {
                model: "openai/gpt-4o".into(),
                require_tools: false,
                require_json: true,
                fallbacks: vec![],
            },
        );
        Config {
            llm: LlmConfig {
                providers: vec![ProviderConfig {
                    id: "openai".into(),
                    kind: ProviderKind::OpenaiCompat,
                    base_url: "https://api.openai.com/v1".into(),
                    auth: AuthConfig {
                        env: Some("OPENAI_API_KEY".into()),
                        key: None,
                    },
                    default_model: None,
                }],
                roles,
                ..LlmConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn minimal_valid_config_has_no_fatal_errors() {
        let cfg = minimal_valid_config();
        let errors = cfg.validate();
        assert!(!Config::has_fatal_errors(&errors), "{errors:?}");
    }

    #[test]
    fn missing_providers_is_fatal_under_require_one() {
        let cfg = Config::default();
        let errors = cfg.validate();
        assert!(Config::has_fatal_errors(&errors));
    }

    #[test]
    fn missing_providers_is_a_warning_under_allow_none() {
        let mut cfg = Config::default();
        cfg.llm.startup_policy = LlmStartupPolicy::AllowNone;
        let errors = cfg.validate();
        assert!(!Config::has_fatal_errors(&errors));
        assert!(errors.iter().any(|e| e.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn role_referencing_unknown_provider_is_fatal() {
        let mut cfg = minimal_valid_config();
        cfg.llm.roles.get_mut("basic").unwrap().model = "ghost/some-model".into();
        let errors = cfg.validate();
        assert!(Config::has_fatal_errors(&errors));
    }

    #[test]
    fn zero_recursion_cap_is_fatal() {
        let mut cfg = minimal_valid_config();
        cfg.engine.recursion_cap = 0;
        let errors = cfg.validate();
        assert!(Config::has_fatal_errors(&errors));
    }
}
