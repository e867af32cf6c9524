mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sa_domain::config::Config;
use sa_fabric::ComputeFabric;
use sa_privacy::PrivacyStore;
use sa_sessions::SessionStore;
use sa_usage_store::UsageStore;

use cli::{Cli, Command, ConfigCommand, SessionCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aurarouter=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli::config_path(cli.config.as_deref());

    // `config validate` and `doctor` want to see a load failure directly;
    // every other command falls back to an empty config so a first run
    // against a fresh checkout doesn't hard-fail before `doctor` can say why.
    let config = if config_path.exists() {
        Config::load(Some(&config_path))?
    } else {
        Config::default()
    };

    if let Command::Config(ConfigCommand::Validate) = cli.command {
        let issues = config.validate();
        if issues.is_empty() {
            println!("no issues");
        } else {
            for issue in &issues {
                println!("{issue}");
            }
        }
        let errors = issues.iter().filter(|e| e.severity == sa_domain::config::ConfigSeverity::Error).count();
        if errors > 0 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let data_dir = config_path.parent().map(|p| p.to_path_buf()).unwrap_or_else(|| std::path::PathBuf::from("."));

    if let Command::Doctor = cli.command {
        let passed = cli::doctor::run(&config, &config_path, &data_dir).await?;
        if !passed {
            std::process::exit(1);
        }
        return Ok(());
    }

    if let Command::ListModels = cli.command {
        return cli::list_models::run(&config);
    }

    std::fs::create_dir_all(&data_dir)?;
    let usage_store = Arc::new(UsageStore::new(data_dir.join("usage.json")));
    let privacy_store = Arc::new(PrivacyStore::new(data_dir.join("privacy.json")));

    let fabric = Arc::new(ComputeFabric::with_privacy_store(config.clone(), usage_store, Some(privacy_store))?);

    if config.sessions.enabled {
        let session_store = SessionStore::new(data_dir.join("sessions.json"))?;
        fabric.attach_sessions(session_store, config.sessions.condensation_threshold, config.sessions.auto_gist);
    }

    match cli.command {
        Command::Run { role, prompt, json, chain, json_mode, intent } => {
            cli::run::run(fabric, &role, &prompt, json, json_mode, chain, intent.as_deref()).await?;
        }
        Command::Compare { role, prompt, enable_compare, models, json_mode } => {
            cli::compare::run(fabric, &role, &prompt, enable_compare, models, json_mode).await?;
        }
        Command::Session(session_cmd) => match session_cmd {
            SessionCommand::Create { role, context_limit } => {
                cli::session::create(fabric, &role, context_limit)?;
            }
            SessionCommand::Message { session_id, message, json, json_mode, no_gist } => {
                cli::session::message(fabric, session_id, &message, json, json_mode, no_gist).await?;
            }
            SessionCommand::Status { session_id } => {
                cli::session::status(fabric, session_id)?;
            }
            SessionCommand::List { limit, offset } => {
                cli::session::list(fabric, limit, offset)?;
            }
            SessionCommand::Delete { session_id } => {
                cli::session::delete(fabric, session_id)?;
            }
        },
        Command::ListModels | Command::Doctor | Command::Config(_) => unreachable!("handled above"),
    }

    Ok(())
}
