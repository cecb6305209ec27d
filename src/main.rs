//! Entry point for llm-adapter, a command-line front end to the adapter core.
//!
//! Loads environment variables and configuration, installs the log
//! subscriber, and dispatches to the chosen subcommand via [`cli`].

mod cli;

use anyhow::Result;
use llm_adapter::config::Config;
use tracing_subscriber::EnvFilter;

/// Runs the llm-adapter CLI.
///
/// Loads `.env` files (silently ignored if absent), parses command-line
/// arguments, then logs to stderr so stdout carries only command output.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = cli::parse();
    let config = Config::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    cli::run(cli, config).await
}
