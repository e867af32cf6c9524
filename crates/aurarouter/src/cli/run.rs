//! `aurarouter run` — one-shot role-chain execution.

use std::sync::Arc;

use sa_fabric::ComputeFabric;

pub async fn run(
    fabric: Arc<ComputeFabric>,
    role: &str,
    prompt: &str,
    json: bool,
    json_mode: bool,
    chain: Vec<String>,
    intent: Option<&str>,
) -> anyhow::Result<()> {
    let chain_override = (!chain.is_empty()).then_some(chain);
    let response = fabric
        .execute(role, prompt, json_mode, None, chain_override, intent)
        .await;

    match response {
        Some(text) => {
            if json {
                let payload = serde_json::json!({ "role": role, "response": text });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{text}");
            }
            Ok(())
        }
        None => {
            eprintln!("error: every model in role '{role}'s chain failed");
            std::process::exit(1);
        }
    }
}
