//! Command-line interface definition and dispatch for llm-adapter.
//!
//! Uses [`clap`] for argument parsing with derive macros. Every adapter
//! operation has a subcommand that prints its result as JSON on stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use llm_adapter::config::Config;
use llm_adapter::provider::OpenAiClient;
use llm_adapter::registry;
use llm_adapter::secrets::{FileSecretStore, ProjectId, StoreResolver};
use llm_adapter::{Integration, PromptStruct};

/// Top-level CLI structure for llm-adapter.
#[derive(Parser)]
#[command(name = "llm-adapter", about = "Validate, discover, and invoke OpenAI-compatible models")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands. The `///` doc comments on variants double as
/// `--help` text rendered by clap.
#[derive(Subcommand)]
pub enum Commands {
    /// Validate an integration settings document
    Check {
        /// Settings as inline JSON or a path to a JSON file
        settings: String,
    },
    /// List provider models
    Models {
        /// Settings (inline JSON or file) whose credential is resolved from the secret store
        #[arg(short, long, conflicts_with = "api_key")]
        settings: Option<String>,
        /// Project the credential is scoped to
        #[arg(short, long, default_value_t = 0)]
        project: ProjectId,
        /// Use this API key directly (defaults to $OPENAI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        api_base: Option<String>,
        #[arg(long)]
        api_type: Option<String>,
        #[arg(long)]
        api_version: Option<String>,
    },
    /// Predict with whichever mode the configured model supports
    Predict {
        #[arg(short, long)]
        settings: String,
        #[arg(short, long, default_value_t = 0)]
        project: ProjectId,
        /// Treat the prompt as a JSON prompt structure instead of plain text
        #[arg(long)]
        json: bool,
        /// Prompt text
        prompt: Vec<String>,
    },
    /// Send a prebuilt chat completion request
    Chat {
        #[arg(short, long)]
        settings: String,
        #[arg(short, long, default_value_t = 0)]
        project: ProjectId,
        /// Request body as inline JSON or a path to a JSON file
        request: String,
    },
    /// Send a prebuilt text completion request
    Complete {
        #[arg(short, long)]
        settings: String,
        #[arg(short, long, default_value_t = 0)]
        project: ProjectId,
        /// Request body as inline JSON or a path to a JSON file
        request: String,
    },
    /// Embed texts with an embeddings model
    Embed {
        #[arg(short, long)]
        settings: String,
        #[arg(short, long, default_value_t = 0)]
        project: ProjectId,
        /// Embed the joined text as one query and print only its vector
        #[arg(long)]
        query: bool,
        /// Texts to embed, one per argument
        texts: Vec<String>,
    },
    /// Count tokens in a text for a model
    Tokens {
        #[arg(short, long, default_value = llm_adapter::constants::DEFAULT_MODEL)]
        model: String,
        text: Vec<String>,
    },
    /// Seed the default capability tables into the secret store
    Bootstrap,
    /// Show the global capability registry
    Registry,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Subcommands for the `config` command.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current config
    Show,
}

/// Parses command-line arguments into a [`Cli`] struct.
///
/// Delegates to [`clap::Parser::parse`], which exits the process on invalid input.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Dispatches the parsed CLI command to its handler.
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Check { settings } => {
            let integration = build_integration(&config)?;
            print_json(&integration.check_settings(&read_json(&settings)?))
        }
        Commands::Models {
            settings,
            project,
            api_key,
            api_base,
            api_type,
            api_version,
        } => {
            let integration = build_integration(&config)?;
            let models = match settings {
                Some(settings) => {
                    let payload = serde_json::json!({
                        "settings": read_json(&settings)?,
                        "project_id": project,
                    });
                    integration.set_models(&payload).await
                }
                None => {
                    let key = api_key
                        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                        .context("No API key: pass --api-key, --settings, or set OPENAI_API_KEY")?;
                    integration
                        .get_models(&key, api_base.as_deref(), api_type.as_deref(), api_version.as_deref())
                        .await
                }
            };
            print_json(&models)
        }
        Commands::Predict {
            settings,
            project,
            json,
            prompt,
        } => {
            let prompt = prompt.join(" ");
            if prompt.is_empty() {
                anyhow::bail!("No prompt provided. Usage: llm-adapter predict -s settings.json \"your prompt\"");
            }
            let prompt = if json {
                serde_json::from_str(&prompt).context("Prompt is not valid JSON")?
            } else {
                Value::String(prompt)
            };
            let integration = build_integration(&config)?;
            let envelope = integration
                .predict(project, &read_json(&settings)?, PromptStruct::new(prompt))
                .await;
            print_json(&envelope)
        }
        Commands::Chat {
            settings,
            project,
            request,
        } => {
            let integration = build_integration(&config)?;
            let envelope = integration
                .chat_completion(project, &read_json(&settings)?, read_json(&request)?)
                .await;
            print_json(&envelope)
        }
        Commands::Complete {
            settings,
            project,
            request,
        } => {
            let integration = build_integration(&config)?;
            let envelope = integration
                .completion(project, &read_json(&settings)?, read_json(&request)?)
                .await;
            print_json(&envelope)
        }
        Commands::Embed {
            settings,
            project,
            query,
            texts,
        } => {
            if texts.is_empty() {
                anyhow::bail!("No text provided. Usage: llm-adapter embed -s settings.json \"text\" ...");
            }
            let integration = build_integration(&config)?;
            let settings = read_json(&settings)?;
            let envelope = if query {
                integration.embed_query(project, &settings, &texts.join(" ")).await
            } else {
                integration.embed_documents(project, &settings, &texts).await
            };
            print_json(&envelope)
        }
        Commands::Tokens { model, text } => {
            let integration = build_integration(&config)?;
            print_json(&integration.count_tokens(&model, &text.join(" ")))
        }
        Commands::Bootstrap => {
            let store = FileSecretStore::new(config.secrets_path()?);
            let written = registry::bootstrap(&store)?;
            let status = if written {
                "seeded default capability tables".green()
            } else {
                "capability tables already present".dimmed()
            };
            println!("{} {}", status, store.path().display());
            Ok(())
        }
        Commands::Registry => {
            let integration = build_integration(&config)?;
            let models: Vec<_> = integration.registry().iter().collect();
            print_json(&models)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let path = Config::config_path()?;
                println!("{} {}", "Config path:".bold(), path.display());
                println!("{} {}", "Secrets path:".bold(), config.secrets_path()?.display());
                println!();
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        },
    }
}

/// Activates the integration against the configured file store and provider.
fn build_integration(config: &Config) -> Result<Integration> {
    let store = Arc::new(FileSecretStore::new(config.secrets_path()?));
    let client = Arc::new(OpenAiClient::new(config.api_base(), config.timeout())?);
    let resolver = Arc::new(StoreResolver::new(store.clone()));
    let integration = Integration::activate(store.as_ref(), client, resolver, config.discovery_policy())?;
    Ok(integration)
}

/// Reads a JSON argument: a path to an existing file, or inline JSON.
fn read_json(arg: &str) -> Result<Value> {
    let path = Path::new(arg);
    if path.is_file() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        return serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {:?}", path));
    }
    serde_json::from_str(arg).context("Argument is neither a file nor valid JSON")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
