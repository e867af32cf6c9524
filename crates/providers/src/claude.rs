//! Anthropic Claude API adapter.
//!
//! Grounded on `original_source/src/aurarouter/providers/claude.py`, which
//! drives the `anthropic` Python SDK; here the same `/v1/messages` wire
//! contract is spoken directly over `reqwest`, in this codebase's usual
//! direct-HTTP adapter style rather than pulling in a vendor SDK crate.

use async_trait::async_trait;
use serde_json::json;

use sa_domain::config::ModelConfig;
use sa_domain::{Error, Message, Result, Role};

use crate::traits::{GenerateResult, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const JSON_MODE_INSTRUCTION: &str =
    "You must respond with valid JSON only. No markdown fences, no commentary — raw JSON.";

pub struct ClaudeProvider {
    model_id: String,
    model_name: String,
    parameters: serde_json::Map<String, serde_json::Value>,
    context_limit: u64,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl ClaudeProvider {
    pub fn new(model_id: &str, cfg: &ModelConfig) -> Result<Self> {
        let timeout = cfg.timeout_secs.unwrap_or(120.0);
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs_f64(timeout))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            model_id: model_id.to_string(),
            model_name: cfg.model_name.clone().unwrap_or_else(|| model_id.to_string()),
            parameters: cfg.parameters.clone(),
            context_limit: cfg.context_limit.unwrap_or(0),
            client,
            api_key: resolve_api_key(cfg),
        })
    }

    fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::Auth(format!(
                "no API key found for Claude model '{}'. Set 'api_key' in config or 'env_key: ANTHROPIC_API_KEY'.",
                self.model_name
            ))
        })
    }

    async fn call(&self, body: serde_json::Value) -> Result<(String, u64, u64)> {
        let api_key = self.require_api_key()?;
        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?
            .error_for_status()
            .map_err(from_reqwest)?;
        let data: serde_json::Value = resp.json().await.map_err(from_reqwest)?;

        let text = data["content"][0]["text"].as_str().unwrap_or_default().to_string();
        let input_tokens = data["usage"]["input_tokens"].as_u64().unwrap_or(0);
        let output_tokens = data["usage"]["output_tokens"].as_u64().unwrap_or(0);
        Ok((text, input_tokens, output_tokens))
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    async fn generate_with_usage(&self, prompt: &str, json_mode: bool) -> Result<GenerateResult> {
        let max_tokens = self
            .parameters
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(4096);

        let mut body = json!({
            "model": self.model_name,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        if json_mode {
            body["system"] = json!(JSON_MODE_INSTRUCTION);
        }
        if let Some(temp) = self.parameters.get("temperature") {
            body["temperature"] = temp.clone();
        }

        let (text, input_tokens, output_tokens) = self.call(body).await?;
        Ok(GenerateResult {
            text,
            input_tokens,
            output_tokens,
            model_id: self.model_id.clone(),
            provider: "claude".to_string(),
            context_limit: self.context_limit,
        })
    }

    async fn generate_with_history(
        &self,
        messages: &[Message],
        system_prompt: &str,
        json_mode: bool,
    ) -> Result<GenerateResult> {
        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let history_system: String = messages
            .iter()
            .filter(|m| matches!(m.role, Role::System))
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let mut full_system_parts: Vec<&str> = Vec::new();
        if !system_prompt.is_empty() {
            full_system_parts.push(system_prompt);
        }
        if !history_system.is_empty() {
            full_system_parts.push(&history_system);
        }
        let mut full_system = full_system_parts.join("\n");
        if json_mode {
            if full_system.is_empty() {
                full_system = JSON_MODE_INSTRUCTION.to_string();
            } else {
                full_system = format!("{full_system}\n{JSON_MODE_INSTRUCTION}");
            }
        }

        let max_tokens = self
            .parameters
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(8192);

        let mut body = json!({
            "model": self.model_name,
            "max_tokens": max_tokens,
            "messages": api_messages,
        });
        if !full_system.is_empty() {
            body["system"] = json!(full_system);
        }
        if let Some(temp) = self.parameters.get("temperature") {
            body["temperature"] = temp.clone();
        }

        let (text, input_tokens, output_tokens) = self.call(body).await?;
        Ok(GenerateResult {
            text,
            input_tokens,
            output_tokens,
            model_id: self.model_id.clone(),
            provider: "claude".to_string(),
            context_limit: self.get_context_limit(),
        })
    }

    fn get_context_limit(&self) -> u64 {
        if self.context_limit > 0 {
            return self.context_limit;
        }
        if self.model_name.starts_with("claude-opus-4")
            || self.model_name.starts_with("claude-sonnet-4")
            || self.model_name.starts_with("claude-haiku-4")
        {
            return 200_000;
        }
        0
    }

    fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider_name(&self) -> &str {
        "claude"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_limit_known_model_family() {
        let cfg = ModelConfig {
            model_name: Some("claude-sonnet-4-5-20250929".into()),
            ..Default::default()
        };
        let provider = ClaudeProvider::new("m1", &cfg).unwrap();
        assert_eq!(provider.get_context_limit(), 200_000);
    }

    #[test]
    fn context_limit_config_override_wins() {
        let cfg = ModelConfig {
            model_name: Some("claude-sonnet-4-5-20250929".into()),
            context_limit: Some(9000),
            ..Default::default()
        };
        let provider = ClaudeProvider::new("m1", &cfg).unwrap();
        assert_eq!(provider.get_context_limit(), 9000);
    }

    #[test]
    fn context_limit_unknown_model_is_zero() {
        let cfg = ModelConfig {
            model_name: Some("some-future-model".into()),
            ..Default::default()
        };
        let provider = ClaudeProvider::new("m1", &cfg).unwrap();
        assert_eq!(provider.get_context_limit(), 0);
    }

    #[test]
    fn missing_api_key_surfaces_auth_error() {
        let cfg = ModelConfig {
            model_name: Some("claude-haiku-4-5-20251001".into()),
            ..Default::default()
        };
        let provider = ClaudeProvider::new("m1", &cfg).unwrap();
        assert!(provider.require_api_key().is_err());
    }
}
