use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsConfig {
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub privacy: PrivacyConfig,
    #[serde(default)]
    pub pricing_overrides: HashMap<String, PricingEntry>,
    #[serde(default)]
    pub triage: TriageConfig,
}

impl Default for SavingsConfig {
    fn default() -> Self {
        Self {
            budget: BudgetConfig::default(),
            privacy: PrivacyConfig::default(),
            pricing_overrides: HashMap::new(),
            triage: TriageConfig::default(),
        }
    }
}

/// Monetary values in USD.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BudgetConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub daily_limit: Option<f64>,
    #[serde(default)]
    pub monthly_limit: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricingEntry {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomPrivacyPattern {
    pub name: String,
    pub pattern: String,
    #[serde(default = "d_medium")]
    pub severity: String,
    #[serde(default)]
    pub description: String,
}

fn d_medium() -> String {
    "medium".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrivacyConfig {
    #[serde(default)]
    pub custom_patterns: Vec<CustomPrivacyPattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageRuleConfig {
    pub max_complexity: i64,
    pub preferred_role: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<TriageRuleConfig>,
    #[serde(default = "d_coding")]
    pub default_role: String,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rules: Vec::new(),
            default_role: d_coding(),
        }
    }
}

fn d_coding() -> String {
    "coding".into()
}
