//! Prompt scanning for sensitive data before it leaves the local fleet,
//! plus a persistent audit trail of what was found.
//!
//! Grounded on `sa-usage-store`'s JSON-file + lock pattern for the store
//! half; the pattern set itself has no prior-art analogue elsewhere in
//! this codebase and is built in directly from the fixed list of
//! categories (email, API key, AWS key, SSN, credit card, confidentiality
//! marker, private IP).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use sa_domain::config::CustomPrivacyPattern;
use sa_domain::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "high" => Severity::High,
            "low" => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

struct Pattern {
    name: String,
    regex: Regex,
    severity: Severity,
    #[allow(dead_code)]
    description: String,
}

static BUILTIN_PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    vec![
        Pattern {
            name: "Email Address".to_string(),
            regex: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap(),
            severity: Severity::Medium,
            description: "email address".to_string(),
        },
        Pattern {
            name: "API Key".to_string(),
            regex: Regex::new(r#"(?i)(api[_-]?key|secret|password|token)\s*[:=]\s*['"]?[A-Za-z0-9_\-]{12,}['"]?"#).unwrap(),
            severity: Severity::High,
            description: "generic API key or password assignment".to_string(),
        },
        Pattern {
            name: "AWS Access Key".to_string(),
            regex: Regex::new(r"AKIA[0-9A-Z]{16}").unwrap(),
            severity: Severity::High,
            description: "AWS access key id".to_string(),
        },
        Pattern {
            name: "Social Security Number".to_string(),
            regex: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),
            severity: Severity::High,
            description: "US social security number".to_string(),
        },
        Pattern {
            name: "Credit Card Number".to_string(),
            regex: Regex::new(r"\b(?:\d[ -]*?){13,16}\b").unwrap(),
            severity: Severity::High,
            description: "credit card number".to_string(),
        },
        Pattern {
            name: "Confidential Marker".to_string(),
            regex: Regex::new(r"(?i)\b(confidential|internal only|do not distribute|proprietary)\b").unwrap(),
            severity: Severity::Medium,
            description: "confidentiality marker".to_string(),
        },
        Pattern {
            name: "Private IP Address".to_string(),
            regex: Regex::new(r"\b(?:10\.(?:\d{1,3}\.){2}\d{1,3}|192\.168\.(?:\d{1,3}\.)\d{1,3}|172\.(?:1[6-9]|2\d|3[0-1])\.(?:\d{1,3}\.)\d{1,3})\b").unwrap(),
            severity: Severity::Low,
            description: "RFC1918 private IP address".to_string(),
        },
    ]
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyMatch {
    pub pattern_name: String,
    pub severity: Severity,
    pub matched_text_redacted: String,
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyEvent {
    pub timestamp: DateTime<Utc>,
    pub model_id: String,
    pub provider: String,
    pub match_count: usize,
    pub matches: Vec<PrivacyMatch>,
    pub prompt_length: usize,
    pub recommendation: String,
}

fn redact(matched: &str) -> String {
    let prefix: String = matched.chars().take(4).collect();
    format!("{prefix}***")
}

/// Compiles the built-in pattern set plus any config-supplied custom
/// patterns (which extend, never override, the built-ins) and scans
/// prompts destined for cloud-tier models.
pub struct PrivacyAuditor {
    custom: Vec<Pattern>,
}

impl PrivacyAuditor {
    pub fn new(custom_patterns: &[CustomPrivacyPattern]) -> sa_domain::Result<Self> {
        let mut custom = Vec::with_capacity(custom_patterns.len());
        for p in custom_patterns {
            let regex = Regex::new(&p.pattern)
                .map_err(|e| sa_domain::Error::Config(format!("invalid privacy pattern {}: {e}", p.name)))?;
            custom.push(Pattern {
                name: p.name.clone(),
                regex,
                severity: Severity::parse(&p.severity),
                description: p.description.clone(),
            });
        }
        Ok(Self { custom })
    }

    /// Returns `None` when `hosting_tier_is_cloud` is false: the auditor
    /// only inspects prompts bound for cloud-tier destinations.
    pub fn audit(
        &self,
        prompt: &str,
        model_id: &str,
        provider: &str,
        hosting_tier_is_cloud: bool,
    ) -> Option<PrivacyEvent> {
        if !hosting_tier_is_cloud {
            return None;
        }
        let mut matches = Vec::new();
        for pattern in BUILTIN_PATTERNS.iter().chain(self.custom.iter()) {
            for m in pattern.regex.find_iter(prompt) {
                matches.push(PrivacyMatch {
                    pattern_name: pattern.name.to_string(),
                    severity: pattern.severity,
                    matched_text_redacted: redact(m.as_str()),
                    position: m.start(),
                });
            }
        }
        if matches.is_empty() {
            return None;
        }
        let max_severity = matches.iter().map(|m| m.severity).max().unwrap();
        let recommendation = match max_severity {
            Severity::High => "Route to a local model; high-severity sensitive data detected.".to_string(),
            Severity::Medium => "Review before sending to a cloud model.".to_string(),
            Severity::Low => "Low-severity match; proceed with awareness.".to_string(),
        };
        Some(PrivacyEvent {
            timestamp: Utc::now(),
            model_id: model_id.to_string(),
            provider: provider.to_string(),
            match_count: matches.len(),
            matches,
            prompt_length: prompt.len(),
            recommendation,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEvent {
    timestamp: DateTime<Utc>,
    model_id: String,
    provider: String,
    match_count: usize,
    severities: Vec<Severity>,
    pattern_names: Vec<String>,
    prompt_length: usize,
    recommendation: String,
}

impl From<&PrivacyEvent> for StoredEvent {
    fn from(e: &PrivacyEvent) -> Self {
        Self {
            timestamp: e.timestamp,
            model_id: e.model_id.clone(),
            provider: e.provider.clone(),
            match_count: e.match_count,
            severities: e.matches.iter().map(|m| m.severity).collect(),
            pattern_names: e.matches.iter().map(|m| m.pattern_name.clone()).collect(),
            prompt_length: e.prompt_length,
            recommendation: e.recommendation.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivacySummary {
    pub total_events: usize,
    pub by_severity: std::collections::HashMap<String, usize>,
    pub by_pattern: std::collections::HashMap<String, usize>,
}

/// Persistent, thread-safe, append-only store. The prompt text itself is
/// never persisted — only the redacted match metadata.
pub struct PrivacyStore {
    path: PathBuf,
    events: RwLock<Vec<StoredEvent>>,
    write_lock: Mutex<()>,
}

impl PrivacyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let events = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Self {
            path,
            events: RwLock::new(events),
            write_lock: Mutex::new(()),
        }
    }

    pub fn record(&self, event: &PrivacyEvent) -> Result<()> {
        let _guard = self.write_lock.lock();
        {
            let mut events = self.events.write();
            events.push(event.into());
        }
        self.flush_locked()
    }

    fn flush_locked(&self) -> Result<()> {
        let events = self.events.read();
        let text = serde_json::to_string_pretty(&*events)?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, text)?;
        Ok(())
    }

    pub fn query(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        min_severity: Option<Severity>,
    ) -> Vec<serde_json::Value> {
        self.events
            .read()
            .iter()
            .filter(|e| start.map_or(true, |s| e.timestamp >= s))
            .filter(|e| end.map_or(true, |e2| e.timestamp <= e2))
            .filter(|e| {
                min_severity.map_or(true, |bar| {
                    e.severities.iter().copied().max().map_or(false, |max| max >= bar)
                })
            })
            .map(|e| serde_json::to_value(e).expect("serializable"))
            .collect()
    }

    pub fn summary(&self) -> PrivacySummary {
        let mut summary = PrivacySummary {
            total_events: 0,
            by_severity: std::collections::HashMap::new(),
            by_pattern: std::collections::HashMap::new(),
        };
        for e in self.events.read().iter() {
            summary.total_events += 1;
            for sev in &e.severities {
                let key = match sev {
                    Severity::Low => "low",
                    Severity::Medium => "medium",
                    Severity::High => "high",
                };
                *summary.by_severity.entry(key.to_string()).or_insert(0) += 1;
            }
            for name in &e.pattern_names {
                *summary.by_pattern.entry(name.clone()).or_insert(0) += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_skips_non_cloud_destinations() {
        let auditor = PrivacyAuditor::new(&[]).unwrap();
        let event = auditor.audit("my email is a@b.com", "llama3", "ollama", false);
        assert!(event.is_none());
    }

    #[test]
    fn audit_detects_email() {
        let auditor = PrivacyAuditor::new(&[]).unwrap();
        let event = auditor
            .audit("contact me at jane.doe@example.com please", "claude-sonnet", "claude", true)
            .unwrap();
        assert_eq!(event.match_count, 1);
        assert_eq!(event.matches[0].pattern_name, "Email Address");
        assert!(event.matches[0].matched_text_redacted.ends_with("***"));
    }

    #[test]
    fn audit_no_match_returns_none() {
        let auditor = PrivacyAuditor::new(&[]).unwrap();
        let event = auditor.audit("just a plain sentence", "claude-sonnet", "claude", true);
        assert!(event.is_none());
    }

    #[test]
    fn custom_pattern_extends_builtins() {
        let custom = vec![CustomPrivacyPattern {
            name: "Internal Project Code".into(),
            pattern: r"PROJ-\d{4}".into(),
            severity: "high".into(),
            description: "".into(),
        }];
        let auditor = PrivacyAuditor::new(&custom).unwrap();
        let event = auditor
            .audit("see ticket PROJ-1234 for details", "claude-sonnet", "claude", true)
            .unwrap();
        assert_eq!(event.matches[0].pattern_name, "Internal Project Code");
    }

    #[test]
    fn store_query_filters_by_min_severity() {
        let dir = tempfile::tempdir().unwrap();
        let store = PrivacyStore::new(dir.path().join("privacy.json"));
        let auditor = PrivacyAuditor::new(&[]).unwrap();
        let low = auditor.audit("reach me at 192.168.1.1", "m", "claude", true).unwrap();
        let high = auditor
            .audit("key: abcdefghijklmnop1234", "m", "claude", true)
            .unwrap();
        store.record(&low).unwrap();
        store.record(&high).unwrap();
        let rows = store.query(None, None, Some(Severity::High));
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn summary_counts_by_severity_and_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let store = PrivacyStore::new(dir.path().join("privacy.json"));
        let auditor = PrivacyAuditor::new(&[]).unwrap();
        let event = auditor.audit("email a@b.com", "m", "claude", true).unwrap();
        store.record(&event).unwrap();
        let summary = store.summary();
        assert_eq!(summary.total_events, 1);
        assert_eq!(summary.by_pattern["Email Address"], 1);
    }
}
