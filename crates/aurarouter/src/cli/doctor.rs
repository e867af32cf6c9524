//! `aurarouter doctor` — diagnostic checks against the resolved config.
//!
//! Follows the accumulate-and-print-check pattern common to this codebase's
//! other diagnostic commands, narrowed to the checks that make sense for a
//! config-file-plus-local-providers router rather than a
//! server-with-a-memory-backend.

use sa_domain::config::{Config, ConfigSeverity};

pub async fn run(config: &Config, config_path: &std::path::Path, data_dir: &std::path::Path) -> anyhow::Result<bool> {
    println!("aurarouter doctor");
    println!("=================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_models_and_roles(config, &mut all_passed);
    check_local_providers(config, &mut all_passed).await;
    check_data_dir(data_dir, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &std::path::Path, all_passed: &mut bool) {
    let exists = config_path.exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.display().to_string()
        } else {
            format!("{} not found (using defaults)", config_path.display())
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({error_count} error(s))", issues.len()),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_models_and_roles(config: &Config, all_passed: &mut bool) {
    let models = config.get_all_model_ids().len();
    print_check("Models configured", models > 0, format!("{models} model(s)"));
    if models == 0 {
        *all_passed = false;
    }

    let roles = config.get_all_roles().len();
    print_check("Roles configured", roles > 0, format!("{roles} role(s)"));
    if roles == 0 {
        *all_passed = false;
    }
}

/// Pings every on-prem model's endpoint with a bare GET. Cloud providers
/// are skipped — reaching them requires spending an API call, which a
/// diagnostic command shouldn't do silently.
async fn check_local_providers(config: &Config, all_passed: &mut bool) {
    let client = match reqwest::Client::builder().timeout(std::time::Duration::from_secs(5)).build() {
        Ok(c) => c,
        Err(_) => {
            print_check("Local providers reachable", false, "failed to build HTTP client".into());
            *all_passed = false;
            return;
        }
    };

    let mut any = false;
    for id in config.get_all_model_ids() {
        let Some(cfg) = config.get_model_config(&id) else { continue };
        if cfg.resolved_hosting_tier().is_cloud() {
            continue;
        }
        let Some(endpoint) = cfg.endpoint.clone().or_else(|| cfg.endpoints.first().cloned()) else {
            continue;
        };
        any = true;
        let reachable = client.get(&endpoint).send().await.is_ok();
        print_check(
            &format!("Model '{id}' reachable"),
            reachable,
            if reachable { endpoint } else { format!("{endpoint} (unreachable)") },
        );
        if !reachable {
            *all_passed = false;
        }
    }

    if !any {
        print_check("Local providers reachable", true, "no on-prem models configured".into());
    }
}

fn check_data_dir(data_dir: &std::path::Path, all_passed: &mut bool) {
    let exists = data_dir.exists() || std::fs::create_dir_all(data_dir).is_ok();
    let writable = if exists {
        let probe = data_dir.join(".aurarouter_doctor_probe");
        let w = std::fs::write(&probe, b"probe").is_ok();
        let _ = std::fs::remove_file(&probe);
        w
    } else {
        false
    };

    let ok = exists && writable;
    print_check(
        "Data directory writable",
        ok,
        if ok {
            format!("{} (writable)", data_dir.display())
        } else {
            format!("{} (not writable)", data_dir.display())
        },
    );
    if !ok {
        *all_passed = false;
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
