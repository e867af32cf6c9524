//! Google Gemini API adapter.
//!
//! No Python source survived retrieval filtering for this provider; built by
//! analogy to `claude.rs` and `openapi.rs` against Gemini's
//! `generateContent` REST endpoint, which plays the same role in this
//! family as Anthropic's `/v1/messages`. Auth is an API key passed as the
//! `key` query parameter.

use async_trait::async_trait;
use serde_json::json;

use sa_domain::config::ModelConfig;
use sa_domain::{Error, Message, Result, Role};

use crate::traits::{GenerateResult, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};

pub struct GoogleProvider {
    model_id: String,
    model_name: String,
    parameters: serde_json::Map<String, serde_json::Value>,
    context_limit: u64,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl GoogleProvider {
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
                "no API key found for Google model '{}'. Set 'api_key' in config or 'env_key: GOOGLE_API_KEY'.",
                self.model_name
            ))
        })
    }

    async fn generate_content(
        &self,
        contents: Vec<serde_json::Value>,
        system_instruction: Option<String>,
        json_mode: bool,
    ) -> Result<(String, u64, u64)> {
        let api_key = self.require_api_key()?;
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model_name, api_key
        );

        let mut generation_config = json!({});
        if let Some(temp) = self.parameters.get("temperature") {
            generation_config["temperature"] = temp.clone();
        }
        if let Some(max_tokens) = self.parameters.get("max_tokens") {
            generation_config["maxOutputTokens"] = max_tokens.clone();
        }
        if json_mode {
            generation_config["responseMimeType"] = json!("application/json");
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(system) = system_instruction {
            if !system.is_empty() {
                body["systemInstruction"] = json!({"parts": [{"text": system}]});
            }
        }

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?
            .error_for_status()
            .map_err(from_reqwest)?;
        let data: serde_json::Value = resp.json().await.map_err(from_reqwest)?;

        let text = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let input_tokens = data["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0);
        let output_tokens = data["usageMetadata"]["candidatesTokenCount"].as_u64().unwrap_or(0);
        Ok((text, input_tokens, output_tokens))
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    async fn generate_with_usage(&self, prompt: &str, json_mode: bool) -> Result<GenerateResult> {
        let contents = vec![json!({"role": "user", "parts": [{"text": prompt}]})];
        let (text, input_tokens, output_tokens) = self.generate_content(contents, None, json_mode).await?;
        Ok(GenerateResult {
            text,
            input_tokens,
            output_tokens,
            model_id: self.model_id.clone(),
            provider: "google".to_string(),
            context_limit: self.context_limit,
        })
    }

    async fn generate_with_history(
        &self,
        messages: &[Message],
        system_prompt: &str,
        json_mode: bool,
    ) -> Result<GenerateResult> {
        let history_system: String = messages
            .iter()
            .filter(|m| matches!(m.role, Role::System))
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let full_system = [system_prompt, history_system.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let contents: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .map(|m| {
                let role = if matches!(m.role, Role::Assistant) { "model" } else { "user" };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let (text, input_tokens, output_tokens) =
            self.generate_content(contents, Some(full_system), json_mode).await?;
        Ok(GenerateResult {
            text,
            input_tokens,
            output_tokens,
            model_id: self.model_id.clone(),
            provider: "google".to_string(),
            context_limit: self.get_context_limit(),
        })
    }

    fn get_context_limit(&self) -> u64 {
        if self.context_limit > 0 {
            return self.context_limit;
        }
        if self.model_name.starts_with("gemini-2.0-flash") {
            return 1_048_576;
        }
        if self.model_name.starts_with("gemini-2.0-pro") {
            return 2_097_152;
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
        "google"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_limit_known_family() {
        let cfg = ModelConfig {
            model_name: Some("gemini-2.0-flash".into()),
            ..Default::default()
        };
        let provider = GoogleProvider::new("m1", &cfg).unwrap();
        assert_eq!(provider.get_context_limit(), 1_048_576);
    }

    #[test]
    fn missing_api_key_errors() {
        let cfg = ModelConfig {
            model_name: Some("gemini-2.0-flash".into()),
            ..Default::default()
        };
        let provider = GoogleProvider::new("m1", &cfg).unwrap();
        assert!(provider.require_api_key().is_err());
    }
}
