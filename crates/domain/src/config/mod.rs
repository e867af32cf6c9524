mod execution;
mod mcp;
mod models;
mod roles;
mod savings;
mod sessions;

pub use execution::*;
pub use mcp::*;
pub use models::*;
pub use roles::*;
pub use savings::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming the config file, consulted when no explicit
/// path is given.
pub const CONFIG_ENV_VAR: &str = "AURACORE_ROUTER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub savings: SavingsConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub semantic_verbs: HashMap<String, Vec<String>>,
    /// Unknown top-level keys are preserved on save.
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

impl Config {
    /// Discovery precedence: explicit argument → `AURACORE_ROUTER_CONFIG`
    /// env var → `<user-home>/.auracore/aurarouter/auraconfig.yaml`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(explicit)?;
        let text = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&text)?;
        Ok(cfg)
    }

    fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(p) = explicit {
            return Ok(p.to_path_buf());
        }
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            if !env_path.is_empty() {
                return Ok(PathBuf::from(env_path));
            }
        }
        let home = dirs_home()?;
        Ok(home.join(".auracore").join("aurarouter").join("auraconfig.yaml"))
    }

    /// Atomic save: write sibling `*.tmp` then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_yaml::to_string(self)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        use std::io::Write;
        tmp.write_all(text.as_bytes())?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    // ── read accessors ──────────────────────────────────────────────

    pub fn get_role_chain(&self, role: &str) -> Vec<String> {
        self.roles
            .get(role)
            .map(|c| c.models().to_vec())
            .unwrap_or_default()
    }

    pub fn get_model_config(&self, model_id: &str) -> Option<&ModelConfig> {
        self.models.get(model_id)
    }

    pub fn get_all_model_ids(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn get_all_roles(&self) -> Vec<String> {
        self.roles.keys().cloned().collect()
    }

    pub fn is_savings_enabled(&self) -> bool {
        self.savings.budget.enabled
    }

    pub fn get_max_review_iterations(&self) -> u32 {
        self.execution.max_review_iterations
    }

    pub fn get_semantic_verbs(&self, verb: &str) -> Vec<String> {
        self.semantic_verbs.get(verb).cloned().unwrap_or_default()
    }

    pub fn set_semantic_verb(&mut self, verb: &str, synonyms: Vec<String>) {
        self.semantic_verbs.insert(verb.to_string(), synonyms);
    }

    pub fn is_mcp_tool_enabled(&self, tool_name: &str) -> bool {
        self.mcp.is_tool_enabled(tool_name)
    }

    // ── write accessors ─────────────────────────────────────────────

    pub fn set_model(&mut self, model_id: impl Into<String>, cfg: ModelConfig) {
        self.models.insert(model_id.into(), cfg);
    }

    pub fn remove_model(&mut self, model_id: &str) -> Option<ModelConfig> {
        self.models.remove(model_id)
    }

    pub fn set_role_chain(&mut self, role: impl Into<String>, chain: Vec<String>) {
        self.roles.insert(role.into(), RoleChain::Flat(chain));
    }

    pub fn remove_role(&mut self, role: &str) -> Option<RoleChain> {
        self.roles.remove(role)
    }
}

fn dirs_home() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| Error::Config("could not resolve home directory".into()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Note: a model referenced by a role chain but missing from `models`
    /// is intentionally NOT an error here — the fabric skips such entries
    /// silently at execution time per the model-config invariant.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.roles.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "roles".into(),
                message: "no roles configured".into(),
            });
        }

        for (role, chain) in &self.roles {
            if chain.models().is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("roles.{role}"),
                    message: "role chain is empty".into(),
                });
            }
            let mut missing: Vec<&str> = Vec::new();
            for model_id in chain.models() {
                if !self.models.contains_key(model_id) {
                    missing.push(model_id.as_str());
                }
            }
            if !missing.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("roles.{role}"),
                    message: format!(
                        "references undefined model id(s): {}",
                        missing.join(", ")
                    ),
                });
            }
        }

        if self.savings.budget.enabled {
            if let Some(limit) = self.savings.budget.daily_limit {
                if limit <= 0.0 {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: "savings.budget.daily_limit".into(),
                        message: "daily_limit must be greater than 0 when set".into(),
                    });
                }
            }
            if let Some(limit) = self.savings.budget.monthly_limit {
                if limit <= 0.0 {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: "savings.budget.monthly_limit".into(),
                        message: "monthly_limit must be greater than 0 when set".into(),
                    });
                }
            }
        }

        for (i, pattern) in self.savings.privacy.custom_patterns.iter().enumerate() {
            if let Err(e) = regex::Regex::new(&pattern.pattern) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("savings.privacy.custom_patterns[{i}].pattern"),
                    message: format!("invalid regex \"{}\": {e}", pattern.pattern),
                });
            }
        }

        for (i, rule) in self.savings.triage.rules.iter().enumerate() {
            if rule.preferred_role.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("savings.triage.rules[{i}].preferred_role"),
                    message: "preferred_role must not be empty".into(),
                });
            }
        }

        if !(0.0..=1.0).contains(&self.sessions.condensation_threshold) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "sessions.condensation_threshold".into(),
                message: format!(
                    "condensation_threshold {} is outside the expected [0,1] range",
                    self.sessions.condensation_threshold
                ),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut cfg = Config::default();
        cfg.set_model(
            "m1",
            ModelConfig {
                provider: Some(ProviderKind::Ollama),
                model_name: Some("llama3".into()),
                ..ModelConfig::default()
            },
        );
        cfg.set_role_chain("coding", vec!["m1".into()]);
        cfg
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn missing_model_reference_is_warning_not_error() {
        let mut cfg = valid_config();
        cfg.set_role_chain("reasoning", vec!["ghost-model".into()]);
        let issues = cfg.validate();
        let issue = issues
            .iter()
            .find(|e| e.field == "roles.reasoning")
            .expect("expected warning for missing model reference");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn empty_role_chain_is_warning() {
        let mut cfg = valid_config();
        cfg.set_role_chain("empty_role", vec![]);
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "roles.empty_role" && e.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn zero_daily_limit_with_budget_enabled_is_error() {
        let mut cfg = valid_config();
        cfg.savings.budget.enabled = true;
        cfg.savings.budget.daily_limit = Some(0.0);
        let issues = cfg.validate();
        assert!(issues.iter().any(|e| e.field == "savings.budget.daily_limit"
            && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn invalid_custom_pattern_regex_is_error() {
        let mut cfg = valid_config();
        cfg.savings.privacy.custom_patterns.push(CustomPrivacyPattern {
            name: "bad".into(),
            pattern: "[unclosed".into(),
            severity: "high".into(),
            description: String::new(),
        });
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field.starts_with("savings.privacy.custom_patterns")));
    }

    #[test]
    fn role_chain_flat_and_structured_roundtrip() {
        let mut cfg = valid_config();
        cfg.set_role_chain("summarizer", vec!["m1".into()]);
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.get_role_chain("coding"), vec!["m1".to_string()]);
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "savings.budget.daily_limit".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] savings.budget.daily_limit: must be greater than 0"
        );
    }

    #[test]
    fn unknown_top_level_keys_preserved_on_roundtrip() {
        let yaml = "models: {}\nroles: {}\nfuture_section:\n  foo: bar\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        let out = serde_yaml::to_string(&cfg).unwrap();
        assert!(out.contains("future_section"));
    }
}
