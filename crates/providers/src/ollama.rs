//! Local Ollama HTTP API adapter.
//!
//! Grounded on `original_source/src/aurarouter/providers/ollama.py`:
//! `/api/generate` for single-shot prompts with failover across configured
//! `endpoints`, `/api/chat` for history-based calls.

use async_trait::async_trait;
use serde_json::json;

use sa_domain::config::ModelConfig;
use sa_domain::{Error, Message, Result};

use crate::traits::{GenerateResult, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};

pub struct OllamaProvider {
    model_id: String,
    model_name: String,
    endpoints: Vec<String>,
    parameters: serde_json::Value,
    context_limit: u64,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl OllamaProvider {
    pub fn new(model_id: &str, cfg: &ModelConfig) -> Result<Self> {
        let endpoints = if !cfg.endpoints.is_empty() {
            cfg.endpoints.clone()
        } else {
            vec![cfg
                .endpoint
                .clone()
                .unwrap_or_else(|| "http://localhost:11434/api/generate".to_string())]
        };

        let timeout = cfg.timeout_secs.unwrap_or(120.0);
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs_f64(timeout))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            model_id: model_id.to_string(),
            model_name: cfg.model_name.clone().unwrap_or_else(|| model_id.to_string()),
            endpoints,
            parameters: serde_json::Value::Object(cfg.parameters.clone()),
            context_limit: cfg.context_limit.unwrap_or(0),
            client,
            api_key: resolve_api_key(cfg),
        })
    }

    fn chat_endpoint(&self) -> String {
        match self.endpoints.first() {
            Some(first) => match first.rsplit_once("/api/") {
                Some((base, _)) => format!("{base}/api/chat"),
                None => "http://localhost:11434/api/chat".to_string(),
            },
            None => "http://localhost:11434/api/chat".to_string(),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate_with_usage(&self, prompt: &str, json_mode: bool) -> Result<GenerateResult> {
        let mut payload = json!({
            "model": self.model_name,
            "prompt": prompt,
            "stream": false,
            "options": self.parameters,
        });
        if json_mode {
            payload["format"] = json!("json");
        }

        let mut last_error: Option<Error> = None;
        for url in &self.endpoints {
            match self.client.post(url).json(&payload).send().await {
                Ok(resp) => match resp.error_for_status() {
                    Ok(resp) => {
                        let data: serde_json::Value = resp.json().await.map_err(from_reqwest)?;
                        return Ok(GenerateResult {
                            text: data["response"].as_str().unwrap_or_default().to_string(),
                            input_tokens: data["prompt_eval_count"].as_u64().unwrap_or(0),
                            output_tokens: data["eval_count"].as_u64().unwrap_or(0),
                            model_id: self.model_id.clone(),
                            provider: "ollama".to_string(),
                            context_limit: self.context_limit,
                        });
                    }
                    Err(e) => {
                        last_error = Some(from_reqwest(e));
                        continue;
                    }
                },
                Err(e) => {
                    last_error = Some(from_reqwest(e));
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Provider {
            provider: "ollama".into(),
            message: "no endpoints configured".into(),
        }))
    }

    async fn generate_with_history(
        &self,
        messages: &[Message],
        system_prompt: &str,
        json_mode: bool,
    ) -> Result<GenerateResult> {
        let mut chat_messages = Vec::new();
        if !system_prompt.is_empty() {
            chat_messages.push(json!({"role": "system", "content": system_prompt}));
        }
        for m in messages {
            chat_messages.push(json!({"role": m.role.as_str(), "content": m.content}));
        }

        let mut payload = json!({
            "model": self.model_name,
            "messages": chat_messages,
            "stream": false,
        });
        if let serde_json::Value::Object(params) = &self.parameters {
            if !params.is_empty() {
                payload["options"] = self.parameters.clone();
            }
        }
        if json_mode {
            payload["format"] = json!("json");
        }

        let resp = self
            .client
            .post(self.chat_endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(from_reqwest)?
            .error_for_status()
            .map_err(from_reqwest)?;
        let data: serde_json::Value = resp.json().await.map_err(from_reqwest)?;

        let text = data["message"]["content"].as_str().unwrap_or_default().to_string();
        if text.is_empty() {
            return Err(Error::Provider {
                provider: "ollama".into(),
                message: "empty response from /api/chat".into(),
            });
        }

        Ok(GenerateResult {
            text,
            input_tokens: data["prompt_eval_count"].as_u64().unwrap_or(0),
            output_tokens: data["eval_count"].as_u64().unwrap_or(0),
            model_id: self.model_id.clone(),
            provider: "ollama".to_string(),
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
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_endpoint_derived_from_generate_endpoint() {
        let cfg = ModelConfig {
            endpoints: vec!["http://localhost:11434/api/generate".to_string()],
            ..Default::default()
        };
        let provider = OllamaProvider::new("m1", &cfg).unwrap();
        assert_eq!(provider.chat_endpoint(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn chat_endpoint_falls_back_when_no_endpoints() {
        let cfg = ModelConfig::default();
        let provider = OllamaProvider::new("m1", &cfg).unwrap();
        assert_eq!(provider.chat_endpoint(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn context_limit_defaults_to_zero() {
        let cfg = ModelConfig::default();
        let provider = OllamaProvider::new("m1", &cfg).unwrap();
        assert_eq!(provider.get_context_limit(), 0);
    }
}
