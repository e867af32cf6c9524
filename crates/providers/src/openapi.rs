//! OpenAI-compatible `/v1/chat/completions` adapter.
//!
//! Grounded on `original_source/src/aurarouter/providers/openapi.py`. Works
//! against vLLM, TGI, LocalAI, LM Studio, and any server speaking the OpenAI
//! chat-completions wire format.

use async_trait::async_trait;
use serde_json::json;

use sa_domain::config::ModelConfig;
use sa_domain::{Error, Message, Result};

use crate::traits::{GenerateResult, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};

pub struct OpenApiProvider {
    model_id: String,
    model_name: String,
    endpoint: String,
    parameters: serde_json::Map<String, serde_json::Value>,
    context_limit: u64,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl OpenApiProvider {
    pub fn new(model_id: &str, cfg: &ModelConfig) -> Result<Self> {
        let endpoint = cfg
            .endpoint
            .clone()
            .unwrap_or_else(|| "http://localhost:8000/v1".to_string());
        let timeout = cfg.timeout_secs.unwrap_or(120.0);
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs_f64(timeout))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            model_id: model_id.to_string(),
            model_name: cfg.model_name.clone().unwrap_or_default(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            parameters: cfg.parameters.clone(),
            context_limit: cfg.context_limit.unwrap_or(0),
            client,
            api_key: resolve_api_key(cfg),
        })
    }

    async fn chat_completions(&self, messages: Vec<serde_json::Value>, json_mode: bool) -> Result<(String, u64, u64)> {
        let url = format!("{}/chat/completions", self.endpoint);

        let mut payload = json!({
            "model": self.model_name,
            "messages": messages,
            "temperature": self.parameters.get("temperature").and_then(|v| v.as_f64()).unwrap_or(0.7),
            "max_tokens": self.parameters.get("max_tokens").and_then(|v| v.as_u64()).unwrap_or(2048),
            "stream": false,
        });
        if json_mode {
            payload["response_format"] = json!({"type": "json_object"});
        }

        let mut req = self.client.post(&url).json(&payload);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(from_reqwest)?.error_for_status().map_err(from_reqwest)?;
        let data: serde_json::Value = resp.json().await.map_err(from_reqwest)?;

        let choices = data["choices"].as_array().cloned().unwrap_or_default();
        let choice = choices.first().ok_or_else(|| Error::Provider {
            provider: "openapi".into(),
            message: "empty choices in response".into(),
        })?;

        let text = choice["message"]["content"]
            .as_str()
            .or_else(|| choice["text"].as_str())
            .unwrap_or_default()
            .to_string();

        let input_tokens = data["usage"]["prompt_tokens"].as_u64().unwrap_or(0);
        let output_tokens = data["usage"]["completion_tokens"].as_u64().unwrap_or(0);
        Ok((text, input_tokens, output_tokens))
    }
}

#[async_trait]
impl LlmProvider for OpenApiProvider {
    async fn generate_with_usage(&self, prompt: &str, json_mode: bool) -> Result<GenerateResult> {
        let messages = vec![json!({"role": "user", "content": prompt})];
        let (text, input_tokens, output_tokens) = self.chat_completions(messages, json_mode).await?;
        Ok(GenerateResult {
            text,
            input_tokens,
            output_tokens,
            model_id: self.model_id.clone(),
            provider: "openapi".to_string(),
            context_limit: self.context_limit,
        })
    }

    async fn generate_with_history(
        &self,
        messages: &[Message],
        system_prompt: &str,
        json_mode: bool,
    ) -> Result<GenerateResult> {
        let mut all_messages = Vec::new();
        if !system_prompt.is_empty() {
            all_messages.push(json!({"role": "system", "content": system_prompt}));
        }
        for m in messages {
            all_messages.push(json!({"role": m.role.as_str(), "content": m.content}));
        }

        let (text, input_tokens, output_tokens) = self.chat_completions(all_messages, json_mode).await?;
        Ok(GenerateResult {
            text,
            input_tokens,
            output_tokens,
            model_id: self.model_id.clone(),
            provider: "openapi".to_string(),
            context_limit: self.context_limit,
        })
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
        "openapi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults_and_trims() {
        let cfg = ModelConfig {
            endpoint: Some("http://localhost:8000/v1/".into()),
            ..Default::default()
        };
        let provider = OpenApiProvider::new("m1", &cfg).unwrap();
        assert_eq!(provider.endpoint, "http://localhost:8000/v1");
    }

    #[test]
    fn no_api_key_is_none() {
        let cfg = ModelConfig::default();
        let provider = OpenApiProvider::new("m1", &cfg).unwrap();
        assert!(provider.resolve_api_key().is_none());
    }
}
