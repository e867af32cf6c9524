//! Shared utility functions for provider adapters.

use sa_domain::config::ModelConfig;
use sa_domain::error::Error;

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

/// Resolve the API key for a model config.
///
/// Precedence: the explicit `api_key` field, then the environment variable
/// named by `env_key`. `None` means the model needs no key (local providers)
/// or none could be found.
pub fn resolve_api_key(cfg: &ModelConfig) -> Option<String> {
    if let Some(ref key) = cfg.api_key {
        return Some(key.clone());
    }
    if let Some(ref env_var) = cfg.env_key {
        if let Ok(val) = std::env::var(env_var) {
            return Some(val);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_plaintext_takes_precedence() {
        let cfg = ModelConfig {
            api_key: Some("plaintext-wins".into()),
            env_key: Some("SA_TEST_SHOULD_NOT_BE_READ".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&cfg).as_deref(), Some("plaintext-wins"));
    }

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "SA_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        let cfg = ModelConfig {
            env_key: Some(var_name.into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&cfg).as_deref(), Some("env-secret-value"));
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_env_var_missing_is_none() {
        let cfg = ModelConfig {
            env_key: Some("SA_TEST_NONEXISTENT_VAR_8888".into()),
            ..Default::default()
        };
        assert!(resolve_api_key(&cfg).is_none());
    }

    #[test]
    fn resolve_api_key_no_config_is_none() {
        let cfg = ModelConfig::default();
        assert!(resolve_api_key(&cfg).is_none());
    }
}
