//! CLI module for request-chain
//!
//! Provides subcommands:
//! - `run`: run a chain of simulated requests and report the aggregate result
//! - `config`: print the effective configuration

pub mod run;
pub mod show_config;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// request-chain - run async requests as one chain with an aggregate outcome
#[derive(Parser)]
#[command(name = "request-chain")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a chain of simulated requests
    Run(run::RunArgs),

    /// Print the effective configuration as TOML
    Config,
}

/// Load configuration the same way for every subcommand
pub(crate) fn load_config() -> Result<AppConfig, config::ConfigError> {
    dotenvy::dotenv().ok();
    AppConfig::load()
}

/// Load configuration and start logging; an invalid configuration falls back
/// to the defaults and is reported once logging is up
pub(crate) fn init() -> AppConfig {
    let (config, load_error) = match load_config() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    logging::init_logging(&config.logging);

    if let Some(e) = load_error {
        warn!(error = %e, "Invalid configuration, falling back to defaults");
    }

    config
}
