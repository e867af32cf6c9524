use serde::Serialize;

/// Structured trace events emitted across all AuraRouter crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LlmRequest {
        provider: String,
        model: String,
        role: String,
        success: bool,
        duration_ms: u64,
        input_tokens: u64,
        output_tokens: u64,
    },
    LlmFallback {
        role: String,
        from_model: String,
        to_model: String,
        reason: String,
    },
    BudgetDenied {
        role: String,
        model_id: String,
        provider: String,
        reason: String,
    },
    UsageRecorded {
        model_id: String,
        provider: String,
        success: bool,
        input_tokens: u64,
        output_tokens: u64,
    },
    PrivacyEventRecorded {
        model_id: String,
        provider: String,
        match_count: usize,
        pattern_names: Vec<String>,
    },
    SessionResolved {
        session_id: String,
        is_new: bool,
    },
    SessionCondensed {
        session_id: String,
        old_message_count: usize,
        new_input_tokens: u64,
    },
    GistExtracted {
        session_id: String,
        replaces_count: usize,
    },
    ConfigReloaded {
        model_count: usize,
        role_count: usize,
    },
    ChainReordered {
        role: String,
        advisor: String,
        original_len: usize,
        reordered_len: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "aurarouter_event");
    }
}
