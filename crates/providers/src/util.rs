//! Shared utility functions for provider adapters.

use wk_domain::config::AuthConfig;
use wk_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key from an [`AuthConfig`].
///
/// Precedence: `key` (plaintext, config-only setups), then `env` (read at
/// provider-init time). Neither set is a configuration error, not a runtime
/// one — it is caught by [`wk_domain::config::Config::validate`] before this
/// is ever called in production, but a standalone construction (tests,
/// `doctor`) still needs a real error here.
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    if let Some(ref key) = auth.key {
        return Ok(key.clone());
    }
    if let Some(ref env_var) = auth.env {
        return std::env::var(env_var).map_err(|_| {
            Error::Config(format!(
                "environment variable '{env_var}' not set or not valid UTF-8"
            ))
        });
    }
    Err(Error::Config(
        "no API key configured: set 'key' or 'env' in the provider's auth block".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_plaintext() {
        let auth = AuthConfig {
            key: Some("sk-test-123".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "sk-test-123");
    }

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "WK_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        let auth = AuthConfig {
            env: Some(var_name.into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_env_var_missing() {
        let auth = AuthConfig {
            env: Some("WK_TEST_NONEXISTENT_VAR_8888".into()),
            ..Default::default()
        };
        let err = resolve_api_key(&auth).unwrap_err();
        assert!(err.to_string().contains("WK_TEST_NONEXISTENT_VAR_8888"));
    }

    #[test]
    fn resolve_api_key_no_config() {
        let auth = AuthConfig::default();
        let err = resolve_api_key(&auth).unwrap_err();
        assert!(err.to_string().contains("no API key configured"));
    }

    #[test]
    fn resolve_api_key_plaintext_takes_precedence_over_env() {
        let env_var = "WK_TEST_SHOULD_NOT_BE_READ";
        std::env::set_var(env_var, "env-loses");
        let auth = AuthConfig {
            key: Some("plaintext-wins".into()),
            env: Some(env_var.into()),
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "plaintext-wins");
        std::env::remove_var(env_var);
    }
}
