//! CLI routing and command dispatch.

use crate::core::config::ServerConfig;
use crate::core::config_store;
use crate::core::identity::SystemResolver;
use crate::core::paths::AgentPaths;
use crate::core::remote::ApiClient;
use crate::core::workflow::Provisioner;
use crate::models::agent_config::AgentFile;
use crate::util::privilege;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub mod account;
pub mod monitor;
pub mod sync;

/// Shared context passed to all command handlers.
pub struct CliContext {
    pub paths: AgentPaths,
}

impl CliContext {
    /// Load config.toml and resolve the server configuration from it.
    pub fn load_config(&self) -> Result<(AgentFile, ServerConfig)> {
        if self.paths.needs_migration() {
            warn!(
                legacy = %self.paths.legacy_config.display(),
                config = %self.paths.config_toml.display(),
                "config.yaml is no longer read; move orgid, apikey, teamkey and accounts into config.toml"
            );
        }
        let file = config_store::load(&self.paths.config_toml)?;
        let config = ServerConfig::resolve(&file).with_context(|| {
            format!(
                "Your server is not configured to use ServerAuth ({}). \
                 Please follow the instructions on your server details page.",
                self.paths.config_toml.display()
            )
        })?;
        Ok((file, config))
    }

    pub fn provisioner(&self) -> Result<Provisioner<SystemResolver, ApiClient>> {
        let (file, config) = self.load_config()?;
        let client = ApiClient::new().context("build HTTP client")?;
        Ok(Provisioner::new(config, SystemResolver, client)
            .with_policy(file.policy)
            .with_lock_dir(self.paths.lock_dir.clone()))
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "serverauth",
    version,
    about = "ServerAuth Server Agent: keeps your team's SSH keys in sync on this server"
)]
pub struct Cli {
    /// Configuration directory (default: /etc/serverauth)
    #[arg(long, global = true, value_name = "PATH")]
    pub config_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Install the tracing subscriber. `RUST_LOG` wins over `-v`.
    pub fn init_logging(&self) {
        let default = match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    pub fn run(self) -> Result<()> {
        let ctx = CliContext {
            paths: AgentPaths::resolve(self.config_dir),
        };

        if self.command.requires_root() {
            privilege::require_root(self.command.name())?;
        }

        match self.command {
            Commands::Add(args) => account::run_add(&ctx, args),
            Commands::Remove(args) => account::run_remove(&ctx, args),
            Commands::List(args) => account::run_list(&ctx, args),
            Commands::Sync(args) => sync::run(&ctx, args),
            Commands::Monitor(args) => monitor::run(&ctx, args),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a system account (e.g. root) to have its SSH keys managed by ServerAuth
    Add(account::AddArgs),
    /// Remove a system account from ServerAuth's key management
    Remove(account::RemoveArgs),
    /// List the system accounts managed on this server
    List(account::ListArgs),
    /// Sync the authorized_keys file of every managed account
    Sync(sync::SyncArgs),
    /// Collect server metrics and send them to ServerAuth
    Monitor(monitor::MonitorArgs),
}

impl Commands {
    /// Whether this command requires root privileges.
    pub fn requires_root(&self) -> bool {
        matches!(
            self,
            Commands::Add(_) | Commands::Remove(_) | Commands::Sync(_)
        )
    }

    /// Command name for error messages.
    pub fn name(&self) -> &str {
        match self {
            Commands::Add(_) => "add",
            Commands::Remove(_) => "remove",
            Commands::List(_) => "list",
            Commands::Sync(_) => "sync",
            Commands::Monitor(_) => "monitor",
        }
    }
}
