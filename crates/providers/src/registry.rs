//! Provider construction: the single seam where a configured model turns
//! into a live [`LlmProvider`].
//!
//! Grounded on `fabric.py`'s provider-cache population (`_get_provider`),
//! which dispatches on `config["provider"]` to pick an adapter class. The
//! closed provider-family union from spec §9 ("Dynamic dispatch over
//! provider families") is modeled here as a match over
//! [`ProviderKind`] rather than a class registry, since the set never grows
//! without a code change anyway.

use std::sync::Arc;

use sa_domain::config::{ModelConfig, ProviderKind};
use sa_domain::Result;

use crate::claude::ClaudeProvider;
use crate::google::GoogleProvider;
use crate::llamacpp::LlamaCppProvider;
use crate::llamacpp_server::LlamaCppServerProvider;
use crate::ollama::OllamaProvider;
use crate::openapi::OpenApiProvider;
use crate::traits::LlmProvider;

/// Construct the adapter for a single configured model.
pub fn build_provider(model_id: &str, cfg: &ModelConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider = cfg.provider.unwrap_or(ProviderKind::Ollama);
    let adapter: Arc<dyn LlmProvider> = match provider {
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(model_id, cfg)?),
        ProviderKind::Llamacpp => Arc::new(LlamaCppProvider::new(model_id, cfg)?),
        ProviderKind::LlamacppServer => Arc::new(LlamaCppServerProvider::new(model_id, cfg)?),
        ProviderKind::Claude => Arc::new(ClaudeProvider::new(model_id, cfg)?),
        ProviderKind::Google => Arc::new(GoogleProvider::new(model_id, cfg)?),
        ProviderKind::Openapi => Arc::new(OpenApiProvider::new(model_id, cfg)?),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_ollama_by_default() {
        let cfg = ModelConfig {
            provider: Some(ProviderKind::Ollama),
            ..Default::default()
        };
        let provider = build_provider("m1", &cfg).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_id(), "m1");
    }

    #[test]
    fn builds_claude() {
        let cfg = ModelConfig {
            provider: Some(ProviderKind::Claude),
            model_name: Some("claude-haiku-4-5-20251001".into()),
            ..Default::default()
        };
        let provider = build_provider("cloud1", &cfg).unwrap();
        assert_eq!(provider.provider_name(), "claude");
    }

    #[test]
    fn llamacpp_requires_model_name() {
        let cfg = ModelConfig {
            provider: Some(ProviderKind::Llamacpp),
            ..Default::default()
        };
        assert!(build_provider("m1", &cfg).is_err());
    }
}
