//! HTTP adapter for `llama-server`, llama.cpp's built-in HTTP server.
//!
//! Grounded on `original_source/src/aurarouter/providers/llamacpp_server.py`:
//! POSTs to `{endpoint}/completion` with the server's native parameter
//! names. `generate_with_history` has no Python counterpart (the original
//! only implements single-shot generation against this endpoint); it
//! flattens the message list into a single prompt the same way the fabric's
//! condensation prompt builder does, since `/completion` takes raw text.

use async_trait::async_trait;
use serde_json::json;

use sa_domain::config::ModelConfig;
use sa_domain::{Error, Message, Result};

use crate::traits::{GenerateResult, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};

pub struct LlamaCppServerProvider {
    model_id: String,
    endpoint: String,
    parameters: serde_json::Map<String, serde_json::Value>,
    context_limit: u64,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl LlamaCppServerProvider {
    pub fn new(model_id: &str, cfg: &ModelConfig) -> Result<Self> {
        let endpoint = cfg
            .endpoint
            .clone()
            .unwrap_or_else(|| "http://localhost:8080".to_string());
        let timeout = cfg.timeout_secs.unwrap_or(120.0);
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs_f64(timeout))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            model_id: model_id.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            parameters: cfg.parameters.clone(),
            context_limit: cfg.context_limit.unwrap_or(0),
            client,
            api_key: resolve_api_key(cfg),
        })
    }

    fn param_f64(&self, key: &str, default: f64) -> f64 {
        self.parameters.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
    }

    fn param_u64(&self, key: &str, default: u64) -> u64 {
        self.parameters.get(key).and_then(|v| v.as_u64()).unwrap_or(default)
    }

    async fn complete(&self, prompt: &str, json_mode: bool) -> Result<GenerateResult> {
        let url = format!("{}/completion", self.endpoint);
        let mut payload = json!({
            "prompt": prompt,
            "temperature": self.param_f64("temperature", 0.8),
            "top_p": self.param_f64("top_p", 0.95),
            "top_k": self.param_u64("top_k", 40),
            "repeat_penalty": self.param_f64("repeat_penalty", 1.1),
            "n_predict": self.param_u64("n_predict", 2048),
            "stream": false,
        });

        if json_mode {
            payload["json_schema"] = json!({
                "type": "object",
                "properties": {},
                "additionalProperties": true,
            });
        }

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(from_reqwest)?
            .error_for_status()
            .map_err(from_reqwest)?;
        let data: serde_json::Value = resp.json().await.map_err(from_reqwest)?;

        Ok(GenerateResult {
            text: data["content"].as_str().unwrap_or_default().to_string(),
            input_tokens: data["tokens_evaluated"].as_u64().unwrap_or(0),
            output_tokens: data["tokens_predicted"].as_u64().unwrap_or(0),
            model_id: self.model_id.clone(),
            provider: "llamacpp-server".to_string(),
            context_limit: self.context_limit,
        })
    }
}

#[async_trait]
impl LlmProvider for LlamaCppServerProvider {
    async fn generate_with_usage(&self, prompt: &str, json_mode: bool) -> Result<GenerateResult> {
        let result = self.complete(prompt, json_mode).await?;
        if result.text.is_empty() {
            return Err(Error::Provider {
                provider: "llamacpp-server".into(),
                message: "empty response from /completion".into(),
            });
        }
        Ok(result)
    }

    async fn generate_with_history(
        &self,
        messages: &[Message],
        system_prompt: &str,
        json_mode: bool,
    ) -> Result<GenerateResult> {
        let mut prompt = String::new();
        if !system_prompt.is_empty() {
            prompt.push_str("SYSTEM: ");
            prompt.push_str(system_prompt);
            prompt.push('\n');
        }
        for m in messages {
            prompt.push_str(&m.role.as_str().to_uppercase());
            prompt.push_str(": ");
            prompt.push_str(&m.content);
            prompt.push('\n');
        }
        prompt.push_str("ASSISTANT:");

        let result = self.complete(&prompt, json_mode).await?;
        if result.text.is_empty() {
            return Err(Error::Provider {
                provider: "llamacpp-server".into(),
                message: "empty response from /completion".into(),
            });
        }
        Ok(result)
    }

    fn get_context_limit(&self) -> u64 {
        self.context_limit
    }

    fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider_name(&self) -> &str {
        "llamacpp-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trims_trailing_slash() {
        let cfg = ModelConfig {
            endpoint: Some("http://localhost:8080/".into()),
            ..Default::default()
        };
        let provider = LlamaCppServerProvider::new("m1", &cfg).unwrap();
        assert_eq!(provider.endpoint, "http://localhost:8080");
    }

    #[test]
    fn param_defaults_used_when_unset() {
        let cfg = ModelConfig::default();
        let provider = LlamaCppServerProvider::new("m1", &cfg).unwrap();
        assert_eq!(provider.param_f64("temperature", 0.8), 0.8);
        assert_eq!(provider.param_u64("n_predict", 2048), 2048);
    }

    #[test]
    fn param_overrides_applied() {
        let mut params = serde_json::Map::new();
        params.insert("temperature".into(), json!(0.3));
        let cfg = ModelConfig {
            parameters: params,
            ..Default::default()
        };
        let provider = LlamaCppServerProvider::new("m1", &cfg).unwrap();
        assert_eq!(provider.param_f64("temperature", 0.8), 0.3);
    }
}
