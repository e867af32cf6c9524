//! Session lifecycle management: context pressure and condensation.
//!
//! Grounded on `original_source/src/aurarouter/sessions/manager.py`
//! (`prepare_messages`, pressure/condensation protocol, fallback gist,
//! persistence-on-every-boundary-mutation). The manager takes a
//! `generate_fn` closure instead of holding a reference to the fabric,
//! breaking the fabric ↔ manager cycle described in spec §9: the fabric
//! binds a closure to `self.execute("summarizer", ...)` at wire-up time,
//! so the manager has no type dependency on the fabric.

use uuid::Uuid;

use sa_domain::{Gist, Message, Session};

use crate::gisting::{build_condensation_prompt, build_fallback_gist_prompt, extract_gist, inject_gist_instruction};
use crate::store::{SessionStore, SessionSummary};

/// `(role, prompt) -> Option<String>`, bound by the caller to a generation
/// call (typically `ComputeFabric::execute("summarizer", prompt)`).
pub type GenerateFn = Box<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

pub struct SessionManager {
    store: SessionStore,
    condensation_threshold: f64,
    auto_gist: bool,
    generate_fn: Option<GenerateFn>,
}

impl SessionManager {
    pub fn new(
        store: SessionStore,
        condensation_threshold: f64,
        auto_gist: bool,
        generate_fn: Option<GenerateFn>,
    ) -> Self {
        Self {
            store,
            condensation_threshold,
            auto_gist,
            generate_fn,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn create_session(&self, role: &str, context_limit: u64) -> sa_domain::Result<Session> {
        let mut session = Session::new(context_limit);
        session.metadata.active_role = role.to_string();
        self.store.save(&session)?;
        Ok(session)
    }

    pub fn get_session(&self, session_id: Uuid) -> Option<Session> {
        self.store.load(session_id)
    }

    pub fn delete_session(&self, session_id: Uuid) -> sa_domain::Result<bool> {
        self.store.delete(session_id)
    }

    pub fn list_sessions(&self, limit: usize, offset: usize) -> Vec<SessionSummary> {
        self.store.list_sessions(limit, offset)
    }

    pub fn add_user_message(
        &self,
        session: &mut Session,
        content: impl Into<String>,
        tokens: u64,
    ) -> sa_domain::Result<()> {
        let mut msg = Message::user(content);
        msg.tokens = tokens;
        session.history.push(msg);
        session.updated_at = chrono::Utc::now();
        self.store.save(session)
    }

    /// Extracts a gist (if present) from `content` before appending the
    /// assistant message, and stores it as a zero-replacement gist.
    pub fn add_assistant_message(
        &self,
        session: &mut Session,
        content: &str,
        model_id: &str,
        tokens: u64,
    ) -> sa_domain::Result<()> {
        let (clean_content, gist_text) = extract_gist(content);

        session.history.push(Message::assistant(clean_content, model_id, tokens));

        if let Some(summary) = gist_text {
            session.shared_context.push(Gist {
                source_role: session.metadata.active_role.clone(),
                source_model_id: model_id.to_string(),
                summary,
                replaces_count: 0,
            });
        }

        session.updated_at = chrono::Utc::now();
        self.store.save(session)
    }

    /// Produces the exact message list sent to
    /// `provider.generate_with_history`: shared-context gists prepended as
    /// a synthesized system message, then raw history, with the gist
    /// instruction injected into the final user turn when `auto_gist` is on.
    pub fn prepare_messages(&self, session: &Session) -> Vec<Message> {
        let mut messages = session.history.clone();

        if !session.shared_context.is_empty() {
            let prefix = session
                .shared_context
                .iter()
                .map(|g| g.summary.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let prefix = format!("Prior-turn context:\n{prefix}");
            messages.insert(0, Message::system(prefix));
        }

        if self.auto_gist {
            if let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == sa_domain::Role::User) {
                last_user.content = inject_gist_instruction(&last_user.content);
            }
        }

        messages
    }

    /// `pressure >= condensation_threshold`.
    pub fn check_pressure(&self, session: &Session) -> bool {
        session.pressure() >= self.condensation_threshold
    }

    /// Condenses history when it has more than 2 messages: the oldest
    /// `len(history) - 2` messages are summarized into a single gist and
    /// dropped. Silent no-op (session unchanged) if `generate_fn` is unset,
    /// history is too short, or the summarizer fails/returns empty.
    pub fn condense(&self, session: &mut Session) -> sa_domain::Result<()> {
        let Some(generate_fn) = self.generate_fn.as_ref() else {
            return Ok(());
        };
        if session.history.len() <= 2 {
            return Ok(());
        }

        let split_at = session.history.len() - 2;
        let old_messages: Vec<Message> = session.history[..split_at].to_vec();
        let kept: Vec<Message> = session.history[split_at..].to_vec();

        let prompt = build_condensation_prompt(&old_messages);
        let summary = match generate_fn("summarizer", &prompt) {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                tracing::warn!(session_id = %session.session_id, "condensation summarizer returned nothing; session unchanged");
                return Ok(());
            }
        };

        let old_tokens: u64 = old_messages.iter().map(|m| m.tokens).sum();
        let estimated = estimate_tokens(&summary);

        session.shared_context.push(Gist {
            source_role: "summarizer".to_string(),
            source_model_id: String::new(),
            summary,
            replaces_count: old_messages.len(),
        });
        session.history = kept;
        session.token_stats.input_tokens =
            (session.token_stats.input_tokens + estimated).saturating_sub(old_tokens);
        session.updated_at = chrono::Utc::now();

        self.store.save(session)
    }

    /// When `auto_gist` is enabled and the model didn't emit its own
    /// `---GIST---` marker, ask the summarizer for one. Silent on failure.
    pub fn generate_fallback_gist(
        &self,
        session: &mut Session,
        response_text: &str,
        model_id: &str,
    ) -> sa_domain::Result<()> {
        let Some(generate_fn) = self.generate_fn.as_ref() else {
            return Ok(());
        };
        let prompt = build_fallback_gist_prompt(response_text);
        if let Some(summary) = generate_fn("summarizer", &prompt) {
            if !summary.trim().is_empty() {
                session.shared_context.push(Gist {
                    source_role: session.metadata.active_role.clone(),
                    source_model_id: model_id.to_string(),
                    summary: summary.trim().to_string(),
                    replaces_count: 0,
                });
                session.updated_at = chrono::Utc::now();
                self.store.save(session)?;
            }
        }
        Ok(())
    }
}

/// `max(1, len(text.strip())/4)`, a crude chars-per-token estimate used to
/// adjust the input-token counter after condensation replaces a block of
/// history with a much shorter gist.
fn estimate_tokens(text: &str) -> u64 {
    let len = text.trim().len() as u64;
    (len / 4).max(1)
}
