//! CLI entry point for authctx.

pub mod auth;
pub mod context;

use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{Settings, ENV_ACCESS_TOKEN, ENV_CONTEXT};

/// Manage login credentials for API deployments
#[derive(Parser, Debug)]
#[command(name = "authctx", version, about = "Credential manager for API deployments")]
pub struct Cli {
    /// Context to use instead of the active one
    #[arg(short, long, global = true, env = ENV_CONTEXT)]
    pub context: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Bearer token to use instead of the stored credential
    #[arg(long, global = true, env = ENV_ACCESS_TOKEN, hide_env_values = true)]
    pub access_token: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in to the context's deployment
    Login,
    /// Print a valid access token, refreshing it if needed
    Token,
    /// Show the account and token state of a context
    Status,
    /// Remove stored credentials for a context
    Logout,
    /// Manage deployment contexts
    Context(ContextArgs),
}

/// Arguments for the `context` subcommand group.
#[derive(Parser, Debug)]
pub struct ContextArgs {
    #[command(subcommand)]
    pub command: ContextCommands,
}

#[derive(Subcommand, Debug)]
pub enum ContextCommands {
    /// Create or update a context
    Set(SetContextArgs),
    /// Make a context the active one
    Use {
        name: String,
    },
    /// List all contexts
    List,
}

/// Arguments for `authctx context set`.
#[derive(Parser, Debug)]
pub struct SetContextArgs {
    pub name: String,

    /// Base URL of the deployment
    #[arg(long)]
    pub url: Option<String>,

    /// Audience to request tokens for
    #[arg(long)]
    pub audience: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Environment settings overlaid with the global flags.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::from_env()
            .with_context(self.context.clone())
            .with_access_token(self.access_token.clone());
        if let Some(secs) = self.timeout {
            settings = settings.with_timeout(Duration::from_secs(secs));
        }
        settings
    }
}
