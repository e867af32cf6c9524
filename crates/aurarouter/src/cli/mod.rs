pub mod compare;
pub mod doctor;
pub mod list_models;
pub mod run;
pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// AuraRouter — local-first inference router and compute fabric.
#[derive(Debug, Parser)]
#[command(name = "aurarouter", version, about)]
pub struct Cli {
    /// Path to `auraconfig.yaml`. Falls back to `AURACORE_ROUTER_CONFIG`,
    /// then `~/.auracore/aurarouter/auraconfig.yaml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drive a role's model chain once and print the response.
    Run {
        /// Role name from the `roles` section of the config.
        role: String,
        /// The prompt to send.
        prompt: String,
        /// Emit machine-readable JSON instead of plain text.
        #[arg(long)]
        json: bool,
        /// Comma-separated model ids overriding the configured chain.
        #[arg(long, value_delimiter = ',')]
        chain: Vec<String>,
        /// Request JSON-formatted output from the model itself.
        #[arg(long)]
        json_mode: bool,
        /// Free-form label recorded alongside the usage row.
        #[arg(long)]
        intent: Option<String>,
    },
    /// Invoke every model in a role's chain and report all outcomes
    /// side-by-side. Disabled unless explicitly requested, mirroring
    /// `compare_models`'s disabled-by-default tool default.
    Compare {
        role: String,
        prompt: String,
        #[arg(long)]
        enable_compare: bool,
        /// Comma-separated model ids; defaults to the role's configured chain.
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
        #[arg(long)]
        json_mode: bool,
    },
    /// Stateful, multi-turn sessions with automatic context condensation.
    #[command(subcommand)]
    Session(SessionCommand),
    /// List every model id known to the config, with provider and tier.
    ListModels,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Create a new session bound to a role.
    Create {
        role: String,
        /// Overrides the role's first model's context limit.
        #[arg(long)]
        context_limit: Option<u64>,
    },
    /// Send a message within an existing session.
    Message {
        session_id: uuid::Uuid,
        message: String,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        json_mode: bool,
        /// Suppress the auto-gist instruction injection for this turn.
        #[arg(long)]
        no_gist: bool,
    },
    /// Print a session's metadata and token-pressure.
    Status { session_id: uuid::Uuid },
    /// List known sessions, most recently updated first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Delete a session.
    Delete { session_id: uuid::Uuid },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
}

/// Resolves the config path the same way `sa_domain::config::Config::load`
/// would, so diagnostics can report it even on a load failure.
pub fn config_path(explicit: Option<&std::path::Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if let Ok(env_path) = std::env::var(sa_domain::config::CONFIG_ENV_VAR) {
        if !env_path.is_empty() {
            return PathBuf::from(env_path);
        }
    }
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".auracore")
        .join("aurarouter")
        .join("auraconfig.yaml")
}
