use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The closed set of provider families AuraRouter can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Ollama,
    Llamacpp,
    LlamacppServer,
    Claude,
    Google,
    Openapi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::Llamacpp => "llamacpp",
            ProviderKind::LlamacppServer => "llamacpp-server",
            ProviderKind::Claude => "claude",
            ProviderKind::Google => "google",
            ProviderKind::Openapi => "openapi",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ProviderKind::Ollama | ProviderKind::Llamacpp | ProviderKind::LlamacppServer
        )
    }

    pub fn is_cloud_provider(&self) -> bool {
        matches!(self, ProviderKind::Claude | ProviderKind::Google)
    }
}

/// `{on-prem, cloud, dedicated-tenant}`; drives privacy-audit gating and
/// budget-eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostingTier {
    OnPrem,
    Cloud,
    DedicatedTenant,
}

impl HostingTier {
    /// `on-prem` iff provider is a local family, else `cloud`.
    pub fn default_for(provider: ProviderKind) -> Self {
        if provider.is_local() {
            HostingTier::OnPrem
        } else {
            HostingTier::Cloud
        }
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self, HostingTier::Cloud)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelConfig {
    pub provider: Option<ProviderKind>,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Additional endpoints tried in order before `endpoint`, for local
    /// multi-instance failover (e.g. several Ollama hosts).
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub env_key: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub hosting_tier: Option<HostingTier>,
    #[serde(default)]
    pub context_limit: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cost_per_1m_input: Option<f64>,
    #[serde(default)]
    pub cost_per_1m_output: Option<f64>,
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

impl ModelConfig {
    /// Whether this model is empty/unconfigured (no provider set) — the
    /// "missing entries are skipped at execution time" case from the model
    /// config invariant.
    pub fn is_empty(&self) -> bool {
        self.provider.is_none()
    }

    pub fn resolved_hosting_tier(&self) -> HostingTier {
        match (self.hosting_tier, self.provider) {
            (Some(t), _) => t,
            (None, Some(p)) => HostingTier::default_for(p),
            (None, None) => HostingTier::Cloud,
        }
    }
}

pub type ModelsConfig = HashMap<String, ModelConfig>;
