//! `aurarouter session` — stateful, multi-turn execution against a
//! role-bound session with automatic context condensation.

use std::sync::Arc;

use uuid::Uuid;

use sa_fabric::ComputeFabric;

fn require_sessions(fabric: &Arc<ComputeFabric>) -> anyhow::Result<Arc<sa_sessions::SessionManager>> {
    fabric
        .sessions()
        .ok_or_else(|| anyhow::anyhow!("sessions are disabled in this config (`sessions.enabled: false`)"))
}

pub fn create(fabric: Arc<ComputeFabric>, role: &str, context_limit: Option<u64>) -> anyhow::Result<()> {
    let sessions = require_sessions(&fabric)?;
    let config = fabric.config();
    let context_limit = context_limit.unwrap_or_else(|| {
        config
            .get_role_chain(role)
            .iter()
            .find_map(|m| config.get_model_config(m).and_then(|c| c.context_limit))
            .unwrap_or(8192)
    });
    let session = sessions.create_session(role, context_limit)?;
    println!("{}", session.session_id);
    Ok(())
}

pub async fn message(
    fabric: Arc<ComputeFabric>,
    session_id: Uuid,
    message: &str,
    json: bool,
    json_mode: bool,
    no_gist: bool,
) -> anyhow::Result<()> {
    let sessions = require_sessions(&fabric)?;
    let session = sessions
        .get_session(session_id)
        .ok_or_else(|| anyhow::anyhow!("session '{session_id}' not found"))?;

    let config = fabric.config();
    let inject_gist = config.sessions.auto_gist && !no_gist;
    let result = fabric
        .execute_session(&session.metadata.active_role, session_id, message, json_mode, inject_gist, None)
        .await;

    match result {
        Ok(r) => {
            if json {
                let payload = serde_json::json!({
                    "model_id": r.model_id,
                    "response": r.text,
                    "input_tokens": r.input_tokens,
                    "output_tokens": r.output_tokens,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", r.text);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

pub fn status(fabric: Arc<ComputeFabric>, session_id: Uuid) -> anyhow::Result<()> {
    let sessions = require_sessions(&fabric)?;
    let session = sessions
        .get_session(session_id)
        .ok_or_else(|| anyhow::anyhow!("session '{session_id}' not found"))?;
    let payload = serde_json::json!({
        "session_id": session.session_id,
        "active_role": session.metadata.active_role,
        "created_at": session.created_at,
        "updated_at": session.updated_at,
        "history_len": session.history.len(),
        "gists": session.shared_context.len(),
        "token_stats": session.token_stats,
        "pressure": session.pressure(),
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

pub fn list(fabric: Arc<ComputeFabric>, limit: usize, offset: usize) -> anyhow::Result<()> {
    let sessions = require_sessions(&fabric)?;
    for s in sessions.list_sessions(limit, offset) {
        println!("{}  updated={}", s.session_id, s.updated_at);
    }
    Ok(())
}

pub fn delete(fabric: Arc<ComputeFabric>, session_id: Uuid) -> anyhow::Result<()> {
    let sessions = require_sessions(&fabric)?;
    if sessions.delete_session(session_id)? {
        println!("deleted {session_id}");
        Ok(())
    } else {
        eprintln!("error: session '{session_id}' not found");
        std::process::exit(1);
    }
}
