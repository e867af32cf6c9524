//! `aurarouter compare` — side-by-side chain execution, mirroring the
//! fabric's `execute_all`/`compare_models` tool.

use std::sync::Arc;

use sa_fabric::ComputeFabric;

pub async fn run(
    fabric: Arc<ComputeFabric>,
    role: &str,
    prompt: &str,
    enable_compare: bool,
    models: Vec<String>,
    json_mode: bool,
) -> anyhow::Result<()> {
    if !enable_compare {
        eprintln!("error: `compare` is disabled by default; pass --enable-compare to run it");
        std::process::exit(1);
    }

    let model_ids = (!models.is_empty()).then_some(models);
    let attempts = fabric.execute_all(role, prompt, model_ids, json_mode, None).await;

    let payload: Vec<_> = attempts
        .iter()
        .map(|a| {
            serde_json::json!({
                "model_id": a.model_id,
                "provider": a.provider,
                "success": a.success,
                "text": a.text,
                "elapsed_seconds": a.elapsed_seconds,
                "input_tokens": a.input_tokens,
                "output_tokens": a.output_tokens,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
