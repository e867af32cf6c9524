//! The compute fabric: chain iteration with graceful degradation, budget
//! gating, privacy auditing, usage recording, and session-aware execution.
//!
//! Grounded on `examples/original_source/src/aurarouter/fabric.py`'s
//! `ComputeFabric.execute` (the per-attempt protocol: budget check →
//! provider cache → privacy audit → generate → record/callback) fused with
//! `crates/providers/src/router.rs::chat_for_role`'s async per-attempt loop
//! shape and retriable-error classification idiom.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use sa_budget::BudgetManager;
use sa_domain::config::{Config, ModelConfig};
use sa_domain::{Error, Message, Result, Role, Session};
use sa_pricing::{CostEngine, PricingCatalog};
use sa_privacy::{PrivacyAuditor, PrivacyStore};
use sa_providers::{build_provider, GenerateResult, LlmProvider};
use sa_sessions::manager::GenerateFn;
use sa_sessions::{SessionManager, SessionStore};
use sa_usage_store::{UsageRecord, UsageStore};

use crate::advisor::AdvisorRegistry;
use crate::triage::TriageRouter;

/// `on_model_tried` may be 4-arity `(role, model_id, success, elapsed)` or
/// 6-arity `(role, model_id, success, elapsed, input_tokens, output_tokens)`.
/// Rust has no runtime reflection over a closure's parameter count, so the
/// choice is made explicit as a tagged union rather than attempted via
/// introspection — the permitted simplification spec's design notes call
/// out for this exact situation.
pub enum ModelTriedCallback {
    FourArity(Box<dyn Fn(&str, &str, bool, f64) + Send + Sync>),
    SixArity(Box<dyn Fn(&str, &str, bool, f64, u64, u64) + Send + Sync>),
}

impl ModelTriedCallback {
    fn invoke(&self, role: &str, model_id: &str, success: bool, elapsed: f64, input_tokens: u64, output_tokens: u64) {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| match self {
            ModelTriedCallback::FourArity(f) => f(role, model_id, success, elapsed),
            ModelTriedCallback::SixArity(f) => f(role, model_id, success, elapsed, input_tokens, output_tokens),
        }));
        if outcome.is_err() {
            tracing::debug!(role, model_id, "on_model_tried callback panicked; swallowed");
        }
    }
}

/// One model's outcome within an [`ComputeFabric::execute_all`] sweep.
#[derive(Debug, Clone)]
pub struct ModelAttempt {
    pub model_id: String,
    pub provider: String,
    pub success: bool,
    pub text: Option<String>,
    pub elapsed_seconds: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

fn estimate_tokens(text: &str) -> u64 {
    let len = text.trim().len() as u64;
    (len / 4).max(1)
}

fn build_cost_engine(config: &Config) -> CostEngine {
    CostEngine::new(PricingCatalog::new(&config.savings.pricing_overrides))
}

/// Orchestrator for role-chain execution. Owns the provider cache and the
/// collaborators that derive from config (pricing, budget, privacy); the
/// usage store, privacy store, and session store are process-wide and
/// survive `update_config` untouched, per spec's "Hot reload" design note.
pub struct ComputeFabric {
    config: Mutex<Arc<Config>>,
    provider_cache: Mutex<HashMap<String, Arc<dyn LlmProvider>>>,
    cost_engine: Mutex<Arc<CostEngine>>,
    budget: Mutex<Option<Arc<BudgetManager>>>,
    privacy_auditor: Mutex<Option<Arc<PrivacyAuditor>>>,
    usage_store: Arc<UsageStore>,
    privacy_store: Option<Arc<PrivacyStore>>,
    sessions: Mutex<Option<Arc<SessionManager>>>,
    advisors: AdvisorRegistry,
    triage: Mutex<Option<TriageRouter>>,
}

impl ComputeFabric {
    /// Builds a fabric wired with budget and privacy gating derived from
    /// `config` (both collaborators handle their own disablement — a
    /// disabled budget always allows, and the auditor only ever matches
    /// cloud-tier destinations — so there is no need for them to be
    /// optional at this layer). Sessions and advisors are attached
    /// separately since sessions require an `Arc<Self>` to close the
    /// generate_fn cycle (see [`Self::attach_sessions`]).
    pub fn new(config: Config, usage_store: Arc<UsageStore>) -> Result<Self> {
        Self::with_privacy_store(config, usage_store, None)
    }

    pub fn with_privacy_store(
        config: Config,
        usage_store: Arc<UsageStore>,
        privacy_store: Option<Arc<PrivacyStore>>,
    ) -> Result<Self> {
        let privacy_auditor = PrivacyAuditor::new(&config.savings.privacy.custom_patterns)?;
        let budget = BudgetManager::new(build_cost_engine(&config), config.savings.budget.clone());
        let triage = config
            .savings
            .triage
            .enabled
            .then(|| TriageRouter::from_config(&config.savings.triage));
        let cost_engine = build_cost_engine(&config);

        Ok(Self {
            config: Mutex::new(Arc::new(config)),
            provider_cache: Mutex::new(HashMap::new()),
            cost_engine: Mutex::new(Arc::new(cost_engine)),
            budget: Mutex::new(Some(Arc::new(budget))),
            privacy_auditor: Mutex::new(Some(Arc::new(privacy_auditor))),
            usage_store,
            privacy_store,
            sessions: Mutex::new(None),
            advisors: AdvisorRegistry::new(),
            triage: Mutex::new(triage),
        })
    }

    /// Wires the injected `generate_fn` cycle-breaker from spec's "Cyclic-ish
    /// graph" design note: a closure bound to `self.execute("summarizer",
    /// ...)`, captured as a `Weak` so the session manager holds no strong
    /// reference back to the fabric. `SessionManager::condense`/
    /// `generate_fallback_gist` call this closure synchronously, so the
    /// closure bridges back into async code via `block_in_place` +
    /// `Handle::block_on` — legitimate only on a multi-threaded Tokio
    /// runtime, which is what the `aurarouter` binary runs.
    pub fn attach_sessions(self: &Arc<Self>, store: SessionStore, condensation_threshold: f64, auto_gist: bool) {
        let weak = Arc::downgrade(self);
        let generate_fn: GenerateFn = Box::new(move |role, prompt| {
            let fabric = weak.upgrade()?;
            let role = role.to_string();
            let prompt = prompt.to_string();
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current()
                    .block_on(async move { fabric.execute(&role, &prompt, false, None, None, None).await })
            })
        });
        let manager = SessionManager::new(store, condensation_threshold, auto_gist, Some(generate_fn));
        *self.sessions.lock() = Some(Arc::new(manager));
    }

    pub fn register_advisor(&mut self, advisor: Box<dyn crate::advisor::Advisor>) {
        self.advisors.register(advisor);
    }

    pub fn sessions(&self) -> Option<Arc<SessionManager>> {
        self.sessions.lock().clone()
    }

    pub fn cost_engine(&self) -> Arc<CostEngine> {
        self.cost_engine.lock().clone()
    }

    pub fn usage_store(&self) -> &Arc<UsageStore> {
        &self.usage_store
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.lock().clone()
    }

    pub fn triage(&self) -> Option<TriageRouter> {
        self.triage.lock().clone()
    }

    /// Warms the provider cache with a pre-built adapter, bypassing
    /// `sa_providers::build_provider`. Used by tests to exercise chain
    /// iteration against fakes instead of live network adapters.
    pub fn preload_provider(&self, model_id: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.provider_cache.lock().insert(model_id.into(), provider);
    }

    /// Atomically replaces the config and rebuilds exactly the collaborators
    /// that derive from it (pricing, budget, privacy, triage); clears the
    /// provider cache. The usage store, privacy store, and session store are
    /// untouched — in-flight requests complete against the config they
    /// already captured.
    pub fn update_config(&self, new_config: Config) {
        let privacy_auditor = match PrivacyAuditor::new(&new_config.savings.privacy.custom_patterns) {
            Ok(a) => Some(Arc::new(a)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to rebuild privacy auditor from reloaded config; keeping previous");
                self.privacy_auditor.lock().clone()
            }
        };
        let budget = Arc::new(BudgetManager::new(
            build_cost_engine(&new_config),
            new_config.savings.budget.clone(),
        ));
        let cost_engine = Arc::new(build_cost_engine(&new_config));
        let triage = new_config
            .savings
            .triage
            .enabled
            .then(|| TriageRouter::from_config(&new_config.savings.triage));

        *self.config.lock() = Arc::new(new_config);
        self.provider_cache.lock().clear();
        *self.cost_engine.lock() = cost_engine;
        *self.budget.lock() = Some(budget);
        *self.privacy_auditor.lock() = privacy_auditor;
        *self.triage.lock() = triage;
    }

    fn get_or_build_provider(&self, model_id: &str, cfg: &ModelConfig) -> Result<Arc<dyn LlmProvider>> {
        if let Some(p) = self.provider_cache.lock().get(model_id) {
            return Ok(p.clone());
        }
        let provider = build_provider(model_id, cfg)?;
        self.provider_cache.lock().entry(model_id.to_string()).or_insert_with(|| provider.clone());
        Ok(self.provider_cache.lock().get(model_id).unwrap().clone())
    }

    fn record_usage(
        &self,
        role: &str,
        model_id: &str,
        provider: &str,
        intent: Option<&str>,
        is_cloud: bool,
        input_tokens: u64,
        output_tokens: u64,
        elapsed_seconds: f64,
        success: bool,
    ) {
        let record = UsageRecord {
            timestamp_utc: Utc::now(),
            model_id: model_id.to_string(),
            provider: provider.to_string(),
            role: role.to_string(),
            intent: intent.unwrap_or_default().to_string(),
            input_tokens,
            output_tokens,
            elapsed_seconds,
            success,
            is_cloud,
        };
        if let Err(e) = self.usage_store.record(record) {
            tracing::warn!(error = %e, model_id, "failed to persist usage record");
        }
    }

    /// Audits `prompt` if the destination is cloud-tier and a privacy
    /// auditor is configured; persists the event if a privacy store is
    /// attached. Audit failure can only occur at auditor-construction time
    /// in this port (regex compilation), so there is nothing left to swallow
    /// here beyond the best-effort persistence write.
    fn audit_and_record(&self, prompt: &str, model_id: &str, provider_name: &str, is_cloud: bool) {
        let Some(auditor) = self.privacy_auditor.lock().clone() else {
            return;
        };
        let Some(event) = auditor.audit(prompt, model_id, provider_name, is_cloud) else {
            return;
        };
        tracing::warn!(
            model_id,
            provider = provider_name,
            match_count = event.match_count,
            "privacy audit matched sensitive pattern(s) on a cloud-bound prompt"
        );
        if let Some(store) = &self.privacy_store {
            if let Err(e) = store.record(&event) {
                tracing::warn!(error = %e, "failed to persist privacy event");
            }
        }
    }

    /// `chain_override`, when non-empty, replaces the role chain; otherwise
    /// the configured chain is used, then passed through the advisor
    /// registry. Returns `Some("ERROR: ...")` for an empty chain,
    /// `Some("BUDGET_EXCEEDED: ...")` when every non-skipped attempt was
    /// budget-denied, `Some(text)` on success, or `None` when the whole
    /// chain genuinely failed.
    pub async fn execute(
        &self,
        role: &str,
        prompt: &str,
        json_mode: bool,
        on_model_tried: Option<&ModelTriedCallback>,
        chain_override: Option<Vec<String>>,
        intent: Option<&str>,
    ) -> Option<String> {
        let config = self.config();
        let chain = match chain_override {
            Some(c) if !c.is_empty() => c,
            _ => config.get_role_chain(role),
        };
        if chain.is_empty() {
            return Some(format!("ERROR: No models defined for role '{role}' in YAML."));
        }
        let chain = if self.advisors.is_empty() {
            chain
        } else {
            self.advisors.reorder(role, chain).await
        };

        let budget = self.budget.lock().clone();
        let mut any_error = false;
        let mut budget_reason: Option<String> = None;

        for model_id in &chain {
            let Some(model_cfg) = config.get_model_config(model_id).cloned() else {
                continue;
            };
            if model_cfg.is_empty() {
                continue;
            }
            let provider_name = model_cfg.provider.map(|p| p.as_str()).unwrap_or("ollama");
            let is_cloud = model_cfg.resolved_hosting_tier().is_cloud();

            if is_cloud {
                if let Some(budget) = &budget {
                    let decision = budget.check_budget(provider_name, &self.usage_store, Utc::now());
                    if !decision.allowed {
                        if let Some(cb) = on_model_tried {
                            cb.invoke(role, model_id, false, 0.0, 0, 0);
                        }
                        budget_reason = decision.reason;
                        continue;
                    }
                }
            }

            let start = Instant::now();
            let attempt = self.attempt_stateless(model_id, &model_cfg, provider_name, prompt, json_mode, is_cloud).await;

            match attempt {
                Ok(result) => {
                    let elapsed = start.elapsed().as_secs_f64();
                    self.record_usage(
                        role,
                        model_id,
                        provider_name,
                        intent,
                        is_cloud,
                        result.input_tokens,
                        result.output_tokens,
                        elapsed,
                        true,
                    );
                    if let Some(cb) = on_model_tried {
                        cb.invoke(role, model_id, true, elapsed, result.input_tokens, result.output_tokens);
                    }
                    return Some(result.text);
                }
                Err(e) => {
                    let elapsed = start.elapsed().as_secs_f64();
                    any_error = true;
                    tracing::warn!(model_id, error = %e, "model attempt failed");
                    self.record_usage(role, model_id, provider_name, intent, is_cloud, 0, 0, elapsed, false);
                    if let Some(cb) = on_model_tried {
                        cb.invoke(role, model_id, false, elapsed, 0, 0);
                    }
                }
            }
        }

        if budget_reason.is_some() && !any_error {
            return Some(format!(
                "BUDGET_EXCEEDED: {}. Configure local models as fallback.",
                budget_reason.unwrap()
            ));
        }
        None
    }

    async fn attempt_stateless(
        &self,
        model_id: &str,
        model_cfg: &ModelConfig,
        provider_name: &str,
        prompt: &str,
        json_mode: bool,
        is_cloud: bool,
    ) -> Result<GenerateResult> {
        let provider = self.get_or_build_provider(model_id, model_cfg)?;
        if is_cloud {
            self.audit_and_record(prompt, model_id, provider_name, is_cloud);
        }
        let result = provider.generate_with_usage(prompt, json_mode).await?;
        if result.text.trim().is_empty() {
            return Err(Error::Other("Response was empty or invalid.".to_string()));
        }
        Ok(result)
    }

    /// Invokes every model in the selected chain regardless of outcome;
    /// never raises. Used for side-by-side comparison tools
    /// (`compare_models`).
    pub async fn execute_all(
        &self,
        role: &str,
        prompt: &str,
        model_ids: Option<Vec<String>>,
        json_mode: bool,
        intent: Option<&str>,
    ) -> Vec<ModelAttempt> {
        let config = self.config();
        let chain = match model_ids {
            Some(m) if !m.is_empty() => m,
            _ => config.get_role_chain(role),
        };
        let budget = self.budget.lock().clone();
        let mut results = Vec::with_capacity(chain.len());

        for model_id in &chain {
            let Some(model_cfg) = config.get_model_config(model_id).cloned() else {
                continue;
            };
            if model_cfg.is_empty() {
                continue;
            }
            let provider_name = model_cfg.provider.map(|p| p.as_str()).unwrap_or("ollama").to_string();
            let is_cloud = model_cfg.resolved_hosting_tier().is_cloud();

            if is_cloud {
                if let Some(budget) = &budget {
                    let decision = budget.check_budget(&provider_name, &self.usage_store, Utc::now());
                    if !decision.allowed {
                        results.push(ModelAttempt {
                            model_id: model_id.clone(),
                            provider: provider_name,
                            success: false,
                            text: None,
                            elapsed_seconds: 0.0,
                            input_tokens: 0,
                            output_tokens: 0,
                        });
                        continue;
                    }
                }
            }

            let start = Instant::now();
            let attempt = self
                .attempt_stateless(model_id, &model_cfg, &provider_name, prompt, json_mode, is_cloud)
                .await;
            let elapsed = start.elapsed().as_secs_f64();

            match attempt {
                Ok(result) => {
                    self.record_usage(
                        role,
                        model_id,
                        &provider_name,
                        intent,
                        is_cloud,
                        result.input_tokens,
                        result.output_tokens,
                        elapsed,
                        true,
                    );
                    results.push(ModelAttempt {
                        model_id: model_id.clone(),
                        provider: provider_name,
                        success: true,
                        text: Some(result.text),
                        elapsed_seconds: elapsed,
                        input_tokens: result.input_tokens,
                        output_tokens: result.output_tokens,
                    });
                }
                Err(e) => {
                    tracing::warn!(model_id, error = %e, "compare_models attempt failed");
                    self.record_usage(role, model_id, &provider_name, intent, is_cloud, 0, 0, elapsed, false);
                    results.push(ModelAttempt {
                        model_id: model_id.clone(),
                        provider: provider_name,
                        success: false,
                        text: None,
                        elapsed_seconds: elapsed,
                        input_tokens: 0,
                        output_tokens: 0,
                    });
                }
            }
        }

        results
    }

    /// Builds the message list that would be sent for `message` without
    /// committing it to the session (the session is only mutated on a
    /// successful provider call, so a failed attempt leaves it untouched).
    /// Mirrors `SessionManager::prepare_messages` but works off an ephemeral
    /// copy of history with the pending user turn appended.
    fn prepare_ephemeral_messages(session: &Session, message: &str, inject_gist: bool) -> Vec<Message> {
        let mut messages = session.history.clone();
        messages.push(Message::user(message));

        if !session.shared_context.is_empty() {
            let prefix = session
                .shared_context
                .iter()
                .map(|g| g.summary.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            messages.insert(0, Message::system(format!("Prior-turn context:\n{prefix}")));
        }

        if inject_gist {
            if let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == Role::User) {
                last_user.content = sa_sessions::inject_gist_instruction(&last_user.content);
            }
        }

        messages
    }

    /// Differs from `execute` in how the provider is invoked: builds the
    /// full message list via the session manager's protocol and calls
    /// `provider.generate_with_history`. On success, appends a user message
    /// and the (gist-stripped) assistant reply to the session, persists it,
    /// and condenses if pressure now exceeds the threshold.
    pub async fn execute_session(
        &self,
        role: &str,
        session_id: Uuid,
        message: &str,
        json_mode: bool,
        inject_gist: bool,
        intent: Option<&str>,
    ) -> Result<GenerateResult> {
        let sessions = self
            .sessions
            .lock()
            .clone()
            .ok_or_else(|| Error::Config("session support is not configured on this fabric".to_string()))?;
        let mut session = sessions
            .get_session(session_id)
            .ok_or_else(|| Error::Other(format!("session '{session_id}' not found")))?;

        let config = self.config();
        let chain = config.get_role_chain(role);
        if chain.is_empty() {
            return Err(Error::Other(format!("ERROR: No models defined for role '{role}' in YAML.")));
        }
        let chain = if self.advisors.is_empty() {
            chain
        } else {
            self.advisors.reorder(role, chain).await
        };

        let messages = Self::prepare_ephemeral_messages(&session, message, inject_gist);
        let budget = self.budget.lock().clone();
        let mut any_error = false;
        let mut budget_reason: Option<String> = None;

        for model_id in &chain {
            let Some(model_cfg) = config.get_model_config(model_id).cloned() else {
                continue;
            };
            if model_cfg.is_empty() {
                continue;
            }
            let provider_name = model_cfg.provider.map(|p| p.as_str()).unwrap_or("ollama");
            let is_cloud = model_cfg.resolved_hosting_tier().is_cloud();

            if is_cloud {
                if let Some(budget) = &budget {
                    let decision = budget.check_budget(provider_name, &self.usage_store, Utc::now());
                    if !decision.allowed {
                        budget_reason = decision.reason;
                        continue;
                    }
                }
            }

            let start = Instant::now();
            let attempt = async {
                let provider = self.get_or_build_provider(model_id, &model_cfg)?;
                if is_cloud {
                    self.audit_and_record(message, model_id, provider_name, is_cloud);
                }
                let result = provider.generate_with_history(&messages, "", json_mode).await?;
                if result.text.trim().is_empty() {
                    return Err(Error::Other("Response was empty or invalid.".to_string()));
                }
                Ok(result)
            }
            .await;

            match attempt {
                Ok(result) => {
                    let elapsed = start.elapsed().as_secs_f64();
                    self.record_usage(
                        role,
                        model_id,
                        provider_name,
                        intent,
                        is_cloud,
                        result.input_tokens,
                        result.output_tokens,
                        elapsed,
                        true,
                    );

                    sessions.add_user_message(&mut session, message, estimate_tokens(message))?;
                    let gists_before = session.shared_context.len();
                    sessions.add_assistant_message(&mut session, &result.text, &result.model_id, result.output_tokens)?;
                    session.token_stats.input_tokens += result.input_tokens;
                    session.token_stats.output_tokens += result.output_tokens;
                    if result.context_limit > 0 {
                        session.token_stats.context_limit = result.context_limit;
                    }
                    sessions.store().save(&session)?;

                    if inject_gist && session.shared_context.len() == gists_before {
                        sessions.generate_fallback_gist(&mut session, &result.text, &result.model_id)?;
                    }

                    if sessions.check_pressure(&session) {
                        sessions.condense(&mut session)?;
                    }

                    return Ok(result);
                }
                Err(e) => {
                    let elapsed = start.elapsed().as_secs_f64();
                    any_error = true;
                    tracing::warn!(model_id, error = %e, "session model attempt failed");
                    self.record_usage(role, model_id, provider_name, intent, is_cloud, 0, 0, elapsed, false);
                }
            }
        }

        if let Some(reason) = budget_reason.filter(|_| !any_error) {
            return Err(Error::Other(format!("BUDGET_EXCEEDED: {reason}. Configure local models as fallback.")));
        }
        Err(Error::Other("all models in chain failed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sa_domain::config::{HostingTier, ModelsConfig, ProviderKind, RoleChain, RolesConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvider {
        model_id: String,
        provider_name: &'static str,
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        async fn generate_with_usage(&self, _prompt: &str, _json_mode: bool) -> Result<GenerateResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Some(text) => Ok(GenerateResult {
                    text: text.to_string(),
                    input_tokens: 3,
                    output_tokens: 1,
                    model_id: self.model_id.clone(),
                    provider: self.provider_name.to_string(),
                    context_limit: 10_000,
                }),
                None => Err(Error::Provider {
                    provider: self.provider_name.to_string(),
                    message: "simulated failure".to_string(),
                }),
            }
        }

        async fn generate_with_history(
            &self,
            _messages: &[Message],
            _system_prompt: &str,
            _json_mode: bool,
        ) -> Result<GenerateResult> {
            self.generate_with_usage("", false).await
        }

        fn get_context_limit(&self) -> u64 {
            10_000
        }

        fn resolve_api_key(&self) -> Option<String> {
            None
        }

        fn model_id(&self) -> &str {
            &self.model_id
        }

        fn provider_name(&self) -> &str {
            self.provider_name
        }
    }

    fn config_with_roles(models: ModelsConfig, roles: RolesConfig) -> Config {
        Config {
            models,
            roles,
            ..Default::default()
        }
    }

    fn model_cfg(provider: ProviderKind, hosting_tier: Option<HostingTier>) -> ModelConfig {
        ModelConfig {
            provider: Some(provider),
            hosting_tier,
            ..Default::default()
        }
    }

    fn fabric_with(config: Config) -> ComputeFabric {
        let dir = tempfile::tempdir().unwrap();
        let usage_store = Arc::new(UsageStore::new(dir.path().join("usage.json")));
        ComputeFabric::new(config, usage_store).unwrap()
    }

    #[tokio::test]
    async fn happy_local_path_returns_text_and_records_success() {
        let mut models = ModelsConfig::new();
        models.insert("m1".to_string(), model_cfg(ProviderKind::Ollama, None));
        let mut roles = RolesConfig::new();
        roles.insert("coding".to_string(), RoleChain::Flat(vec!["m1".to_string()]));
        let fabric = fabric_with(config_with_roles(models, roles));
        fabric.preload_provider(
            "m1",
            Arc::new(FakeProvider {
                model_id: "m1".into(),
                provider_name: "ollama",
                reply: Some("hi"),
                calls: AtomicUsize::new(0),
            }),
        );

        let result = fabric.execute("coding", "hello", false, None, None, None).await;
        assert_eq!(result, Some("hi".to_string()));

        let rows = fabric.usage_store().query(None, None, None, None, None);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].success);
        assert_eq!(rows[0].input_tokens, 3);
    }

    #[tokio::test]
    async fn fallback_to_next_model_on_failure() {
        let mut models = ModelsConfig::new();
        models.insert("m1".to_string(), model_cfg(ProviderKind::Ollama, None));
        models.insert("m2".to_string(), model_cfg(ProviderKind::Ollama, None));
        let mut roles = RolesConfig::new();
        roles.insert("coding".to_string(), RoleChain::Flat(vec!["m1".to_string(), "m2".to_string()]));
        let fabric = fabric_with(config_with_roles(models, roles));
        fabric.preload_provider(
            "m1",
            Arc::new(FakeProvider {
                model_id: "m1".into(),
                provider_name: "ollama",
                reply: None,
                calls: AtomicUsize::new(0),
            }),
        );
        fabric.preload_provider(
            "m2",
            Arc::new(FakeProvider {
                model_id: "m2".into(),
                provider_name: "ollama",
                reply: Some("ok"),
                calls: AtomicUsize::new(0),
            }),
        );

        let result = fabric.execute("coding", "hello", false, None, None, None).await;
        assert_eq!(result, Some("ok".to_string()));

        let rows = fabric.usage_store().query(None, None, None, None, None);
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].success);
        assert!(rows[1].success);
    }

    #[tokio::test]
    async fn empty_chain_returns_error_string_with_no_records() {
        let fabric = fabric_with(config_with_roles(ModelsConfig::new(), RolesConfig::new()));
        let result = fabric.execute("coding", "hello", false, None, None, None).await;
        assert_eq!(result, Some("ERROR: No models defined for role 'coding' in YAML.".to_string()));
        assert!(fabric.usage_store().query(None, None, None, None, None).is_empty());
    }

    #[tokio::test]
    async fn all_chain_failed_returns_none() {
        let mut models = ModelsConfig::new();
        models.insert("m1".to_string(), model_cfg(ProviderKind::Ollama, None));
        let mut roles = RolesConfig::new();
        roles.insert("coding".to_string(), RoleChain::Flat(vec!["m1".to_string()]));
        let fabric = fabric_with(config_with_roles(models, roles));
        fabric.preload_provider(
            "m1",
            Arc::new(FakeProvider {
                model_id: "m1".into(),
                provider_name: "ollama",
                reply: None,
                calls: AtomicUsize::new(0),
            }),
        );

        let result = fabric.execute("coding", "hello", false, None, None, None).await;
        assert_eq!(result, None);
        let rows = fabric.usage_store().query(None, None, None, None, None);
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].success);
    }

    #[tokio::test]
    async fn budget_denied_cloud_falls_back_to_local_with_no_record_for_cloud() {
        let mut models = ModelsConfig::new();
        models.insert("cloud1".to_string(), model_cfg(ProviderKind::Claude, Some(HostingTier::Cloud)));
        models.insert("local1".to_string(), model_cfg(ProviderKind::Ollama, Some(HostingTier::OnPrem)));
        let mut roles = RolesConfig::new();
        roles.insert(
            "coding".to_string(),
            RoleChain::Flat(vec!["cloud1".to_string(), "local1".to_string()]),
        );
        let mut config = config_with_roles(models, roles);
        config.savings.budget.enabled = true;
        config.savings.budget.daily_limit = Some(1.0);

        let dir = tempfile::tempdir().unwrap();
        let usage_store = Arc::new(UsageStore::new(dir.path().join("usage.json")));
        usage_store
            .record(UsageRecord {
                timestamp_utc: Utc::now(),
                model_id: "cloud1".to_string(),
                provider: "claude".to_string(),
                role: "coding".to_string(),
                intent: String::new(),
                input_tokens: 100_000,
                output_tokens: 100_000,
                elapsed_seconds: 1.0,
                success: true,
                is_cloud: true,
            })
            .unwrap();

        let fabric = ComputeFabric::new(config, usage_store.clone()).unwrap();
        fabric.preload_provider(
            "local1",
            Arc::new(FakeProvider {
                model_id: "local1".into(),
                provider_name: "ollama",
                reply: Some("ans"),
                calls: AtomicUsize::new(0),
            }),
        );

        let result = fabric.execute("coding", "hello", false, None, None, None).await;
        assert_eq!(result, Some("ans".to_string()));

        let rows = usage_store.query(None, None, None, None, None);
        assert_eq!(rows.len(), 2); // the seeded row + local1's success
        assert!(rows.iter().all(|r| r.model_id != "cloud1" || r.timestamp_utc < Utc::now()));
    }

    #[tokio::test]
    async fn privacy_event_recorded_for_cloud_destination_without_blocking() {
        let mut models = ModelsConfig::new();
        models.insert("cloud1".to_string(), model_cfg(ProviderKind::Claude, Some(HostingTier::Cloud)));
        let mut roles = RolesConfig::new();
        roles.insert("coding".to_string(), RoleChain::Flat(vec!["cloud1".to_string()]));
        let fabric = fabric_with(config_with_roles(models, roles));

        let dir = tempfile::tempdir().unwrap();
        let privacy_store = Arc::new(PrivacyStore::new(dir.path().join("privacy.json")));
        let fabric = ComputeFabric::with_privacy_store(fabric.config().as_ref().clone(), fabric.usage_store().clone(), Some(privacy_store.clone())).unwrap();
        fabric.preload_provider(
            "cloud1",
            Arc::new(FakeProvider {
                model_id: "cloud1".into(),
                provider_name: "claude",
                reply: Some("done"),
                calls: AtomicUsize::new(0),
            }),
        );

        let result = fabric
            .execute("coding", "contact user@example.com", false, None, None, None)
            .await;
        assert_eq!(result, Some("done".to_string()));

        let events = privacy_store.query(None, None, None);
        assert_eq!(events.len(), 1);
        let pattern_names = events[0].get("pattern_names").and_then(|v| v.as_array()).unwrap();
        assert!(pattern_names.iter().any(|n| n.as_str().unwrap_or_default().contains("Email")));
    }

    #[tokio::test]
    async fn update_config_clears_provider_cache() {
        let mut models = ModelsConfig::new();
        models.insert("m1".to_string(), model_cfg(ProviderKind::Ollama, None));
        let fabric = fabric_with(config_with_roles(models, RolesConfig::new()));
        fabric.preload_provider(
            "m1",
            Arc::new(FakeProvider {
                model_id: "m1".into(),
                provider_name: "ollama",
                reply: Some("hi"),
                calls: AtomicUsize::new(0),
            }),
        );
        assert!(fabric.provider_cache.lock().contains_key("m1"));
        fabric.update_config(Config::default());
        assert!(fabric.provider_cache.lock().is_empty());
    }
}
