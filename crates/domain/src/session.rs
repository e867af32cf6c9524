use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::message::Message;

/// A summary of one or more prior assistant responses, re-injected as a
/// system-level prefix on future turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gist {
    pub source_role: String,
    pub source_model_id: String,
    pub summary: String,
    /// >0 iff produced by condensation; =0 iff produced by per-turn extraction.
    pub replaces_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub context_limit: u64,
}

impl TokenStats {
    /// Ratio of used to maximum context tokens; 0 when `context_limit == 0`.
    pub fn pressure(&self) -> f64 {
        if self.context_limit == 0 {
            return 0.0;
        }
        (self.input_tokens + self.output_tokens) as f64 / self.context_limit as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionMetadata {
    #[serde(default)]
    pub active_role: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub shared_context: Vec<Gist>,
    #[serde(default)]
    pub token_stats: TokenStats,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

impl Session {
    pub fn new(context_limit: u64) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            history: Vec::new(),
            shared_context: Vec::new(),
            token_stats: TokenStats {
                input_tokens: 0,
                output_tokens: 0,
                context_limit,
            },
            metadata: SessionMetadata::default(),
        }
    }

    pub fn pressure(&self) -> f64 {
        self.token_stats.pressure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressure_zero_context_limit() {
        let s = Session::new(0);
        assert_eq!(s.pressure(), 0.0);
    }

    #[test]
    fn pressure_ratio() {
        let mut s = Session::new(10_000);
        s.token_stats.input_tokens = 7_000;
        s.token_stats.output_tokens = 1_000;
        assert!((s.pressure() - 0.8).abs() < 1e-9);
    }
}
