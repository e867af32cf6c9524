//! The provider adapter contract consumed by the compute fabric.
//!
//! Every model-serving backend — local GGUF runners, local HTTP daemons, and
//! cloud chat APIs alike — implements [`LlmProvider`]. The fabric depends
//! only on this trait, never on a concrete adapter, so adding a new provider
//! family never touches fabric code.

use async_trait::async_trait;

use sa_domain::{Message, Result};

/// The outcome of a single generation call: text plus the token accounting
/// the fabric needs for usage recording, budget checks, and pricing.
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model_id: String,
    pub provider: String,
    /// 0 means unknown.
    pub context_limit: u64,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Single-shot generation from a bare prompt. Must return `Err` on
    /// transport failure; an empty `text` is a valid `Ok` result and is
    /// treated by the fabric as a failed attempt.
    async fn generate_with_usage(&self, prompt: &str, json_mode: bool) -> Result<GenerateResult>;

    /// Generation over an ordered message history plus a system prompt, used
    /// by session-backed calls.
    async fn generate_with_history(
        &self,
        messages: &[Message],
        system_prompt: &str,
        json_mode: bool,
    ) -> Result<GenerateResult>;

    /// The model's context window in tokens, 0 if unknown.
    fn get_context_limit(&self) -> u64;

    /// The resolved API key, if this provider requires one. Resolution order
    /// is explicit config value, then the named environment variable.
    fn resolve_api_key(&self) -> Option<String>;

    /// The model identifier this adapter was constructed for (config key).
    fn model_id(&self) -> &str;

    /// The provider family name (`"ollama"`, `"claude"`, ...).
    fn provider_name(&self) -> &str;
}
