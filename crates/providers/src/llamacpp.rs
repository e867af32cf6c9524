//! Embedded GGUF inference via a local `llama.cpp` CLI binary.
//!
//! Grounded on `original_source/src/aurarouter/providers/llamacpp.py`, which
//! loads GGUF weights in-process through `llama-cpp-python` bindings and
//! caches the loaded model across calls. No Rust crate in this codebase's
//! dependency surface exposes equivalent in-process GGUF bindings, so this
//! adapter instead shells out to a `llama.cpp` CLI binary per call — the
//! `endpoint` field names the binary path, `model_name` the GGUF file.
//! Token counts are estimated from output length rather than read from a
//! bindings-provided usage struct.

use async_trait::async_trait;
use tokio::process::Command;

use sa_domain::config::ModelConfig;
use sa_domain::{Error, Message, Result};

use crate::traits::{GenerateResult, LlmProvider};
use crate::util::resolve_api_key;

pub struct LlamaCppProvider {
    model_id: String,
    binary_path: String,
    model_path: String,
    n_predict: u64,
    temperature: f64,
    context_limit: u64,
    api_key: Option<String>,
}

impl LlamaCppProvider {
    pub fn new(model_id: &str, cfg: &ModelConfig) -> Result<Self> {
        let binary_path = cfg
            .endpoint
            .clone()
            .unwrap_or_else(|| "llama-cli".to_string());
        let model_path = cfg
            .model_name
            .clone()
            .ok_or_else(|| Error::Config(format!("model '{model_id}': llamacpp requires model_name to be a GGUF file path")))?;

        let params = &cfg.parameters;
        let n_predict = params
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(2048);
        let temperature = params.get("temperature").and_then(|v| v.as_f64()).unwrap_or(0.8);

        Ok(Self {
            model_id: model_id.to_string(),
            binary_path,
            model_path,
            n_predict,
            temperature,
            context_limit: cfg.context_limit.unwrap_or(0),
            api_key: resolve_api_key(cfg),
        })
    }

    async fn run(&self, prompt: &str) -> Result<String> {
        let output = Command::new(&self.binary_path)
            .arg("-m")
            .arg(&self.model_path)
            .arg("-p")
            .arg(prompt)
            .arg("-n")
            .arg(self.n_predict.to_string())
            .arg("--temp")
            .arg(self.temperature.to_string())
            .arg("--no-display-prompt")
            .output()
            .await
            .map_err(|e| Error::Provider {
                provider: "llamacpp".into(),
                message: format!("failed to spawn '{}': {e}", self.binary_path),
            })?;

        if !output.status.success() {
            return Err(Error::Provider {
                provider: "llamacpp".into(),
                message: format!(
                    "'{}' exited with {}: {}",
                    self.binary_path,
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64 / 4).max(1)
}

#[async_trait]
impl LlmProvider for LlamaCppProvider {
    async fn generate_with_usage(&self, prompt: &str, _json_mode: bool) -> Result<GenerateResult> {
        let text = self.run(prompt).await?;
        Ok(GenerateResult {
            input_tokens: estimate_tokens(prompt),
            output_tokens: estimate_tokens(&text),
            text,
            model_id: self.model_id.clone(),
            provider: "llamacpp".to_string(),
            context_limit: self.context_limit,
        })
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

        let mut result = self.generate_with_usage(&prompt, json_mode).await?;
        result.provider = "llamacpp".to_string();
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
        "llamacpp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_model_name() {
        let cfg = ModelConfig::default();
        assert!(LlamaCppProvider::new("m1", &cfg).is_err());
    }

    #[test]
    fn defaults_binary_to_llama_cli() {
        let cfg = ModelConfig {
            model_name: Some("/models/weights.gguf".into()),
            ..Default::default()
        };
        let provider = LlamaCppProvider::new("m1", &cfg).unwrap();
        assert_eq!(provider.binary_path, "llama-cli");
        assert_eq!(provider.model_path, "/models/weights.gguf");
    }

    #[test]
    fn estimate_tokens_floors_at_one() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"a".repeat(400)), 100);
    }
}
