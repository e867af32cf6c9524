//! `aurarouter list-models` — prints every configured model id with its
//! resolved provider and hosting tier.

use sa_domain::config::Config;

pub fn run(config: &Config) -> anyhow::Result<()> {
    let mut ids = config.get_all_model_ids();
    ids.sort();
    for id in ids {
        let Some(cfg) = config.get_model_config(&id) else { continue };
        let provider = cfg.provider.map(|p| p.as_str()).unwrap_or("(unset)");
        let tier = if cfg.resolved_hosting_tier().is_cloud() { "cloud" } else { "on-prem" };
        println!("{id:<24} provider={provider:<16} tier={tier}");
    }
    Ok(())
}
