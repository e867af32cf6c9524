//! Complexity-based role remapping, consulted before chain selection when
//! `savings.triage.enabled` is set.
//!
//! Grounded on `savings/triage.py`'s `TriageRule`/`TriageRouter`: rules are
//! evaluated in declared order and the first whose `max_complexity` is
//! greater than or equal to the score wins (`score <= max_complexity`, not a
//! descending scan).

use sa_domain::config::TriageConfig;

#[derive(Debug, Clone)]
pub struct TriageRule {
    pub max_complexity: i64,
    pub preferred_role: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct TriageRouter {
    rules: Vec<TriageRule>,
    default_role: String,
}

impl TriageRouter {
    pub fn new(rules: Vec<TriageRule>, default_role: impl Into<String>) -> Self {
        Self {
            rules,
            default_role: default_role.into(),
        }
    }

    pub fn from_config(config: &TriageConfig) -> Self {
        let rules = config
            .rules
            .iter()
            .map(|r| TriageRule {
                max_complexity: r.max_complexity,
                preferred_role: r.preferred_role.clone(),
                description: r.description.clone(),
            })
            .collect();
        Self::new(rules, config.default_role.clone())
    }

    pub fn select_role(&self, complexity_score: i64) -> String {
        for rule in &self.rules {
            if complexity_score <= rule.max_complexity {
                tracing::info!(
                    complexity_score,
                    max_complexity = rule.max_complexity,
                    role = %rule.preferred_role,
                    description = %rule.description,
                    "triage matched"
                );
                return rule.preferred_role.clone();
            }
        }
        tracing::info!(complexity_score, default_role = %self.default_role, "triage matched no rule");
        self.default_role.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> TriageRouter {
        TriageRouter::new(
            vec![
                TriageRule {
                    max_complexity: 3,
                    preferred_role: "coding_lite".into(),
                    description: "trivial edits".into(),
                },
                TriageRule {
                    max_complexity: 7,
                    preferred_role: "coding".into(),
                    description: "normal tasks".into(),
                },
            ],
            "reasoning",
        )
    }

    #[test]
    fn first_matching_rule_wins() {
        assert_eq!(router().select_role(2), "coding_lite");
        assert_eq!(router().select_role(3), "coding_lite");
    }

    #[test]
    fn falls_through_to_next_rule() {
        assert_eq!(router().select_role(5), "coding");
        assert_eq!(router().select_role(7), "coding");
    }

    #[test]
    fn unmatched_score_returns_default() {
        assert_eq!(router().select_role(8), "reasoning");
    }

    #[test]
    fn empty_rules_always_default() {
        let router = TriageRouter::new(vec![], "coding");
        assert_eq!(router.select_role(0), "coding");
    }
}
