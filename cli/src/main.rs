//! recipe-chat - RecipeAI in the Terminal
//!
//! A line-oriented surface for the chat session engine. Each line you type is
//! a question for RecipeAI; lines starting with `/` are local commands.
//!
//! # Usage
//!
//! ```bash
//! # Ask the default endpoint (http://localhost:8000/predict)
//! recipe-chat
//!
//! # Another endpoint, giving up after 20 seconds
//! recipe-chat --endpoint https://recipes.example.com/predict --timeout 20
//!
//! # With config file
//! recipe-chat --config ~/.config/recipe-chat/config.toml
//!
//! # Verbose logging (to stderr)
//! RUST_LOG=debug recipe-chat
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod app;
mod display;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chat_core::{
    load_config, load_config_from_path, ChatSession, ConfigOverrides, FileStore,
    HttpAnswerEndpoint, SessionStore,
};
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::info;

use app::App;

/// recipe-chat - Ask RecipeAI about cooking from the terminal
#[derive(Parser, Debug)]
#[command(name = "recipe-chat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Answer endpoint URL
    #[arg(short = 'e', long, value_name = "URL")]
    endpoint: Option<String>,

    /// Give up on an answer after this many seconds
    #[arg(short = 't', long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Milliseconds between revealed characters
    #[arg(long, value_name = "MS")]
    reveal_ms: Option<u64>,

    /// Sign-in state file
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "RECIPE_CHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "RECIPE_CHAT_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.endpoint {
            overrides = overrides.with_endpoint_url(url.clone());
        }
        if let Some(secs) = self.timeout {
            overrides = overrides.with_timeout_secs(secs);
        }
        if let Some(ms) = self.reveal_ms {
            overrides = overrides.with_reveal_ms(ms);
        }
        if let Some(ref path) = self.store {
            overrides = overrides.with_store_path(path.clone());
        }
        overrides
    }
}

/// Initialize logging to stderr so it stays out of the transcript
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("recipe_chat={level},chat_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("recipe-chat starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Configuration: defaults < file < env < CLI
    let mut config = match args.config.clone() {
        Some(path) => load_config_from_path(Some(path)).await,
        None => load_config().await,
    }
    .context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        endpoint = %config.endpoint_url,
        source = %config.source(),
        "Configuration loaded"
    );

    // Sign-in state
    let store_path = config
        .store_path
        .clone()
        .or_else(FileStore::default_path)
        .context("No data directory for the sign-in store; pass --store")?;
    let file_store = FileStore::open(&store_path)
        .await
        .with_context(|| format!("Failed to open sign-in store: {}", store_path.display()))?;
    let store = SessionStore::load(file_store)
        .await
        .context("Failed to load sign-in state")?;

    // Session
    let endpoint =
        HttpAnswerEndpoint::from_config(&config).context("Failed to create answer endpoint")?;
    let (tx, rx) = mpsc::channel(config.event_capacity);
    let session = ChatSession::new(endpoint, &config, tx);

    let mut app = App::new(session, rx, store, io::stdout());

    let result = tokio::select! {
        result = app.run(BufReader::new(tokio::io::stdin())) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    };

    app.shutdown();
    info!("recipe-chat stopped");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_become_overrides() {
        let args = Args::parse_from([
            "recipe-chat",
            "--endpoint",
            "http://127.0.0.1:9000/predict",
            "--timeout",
            "15",
            "--reveal-ms",
            "5",
        ]);
        let mut config = chat_core::ChatConfig::default();
        args.overrides().apply(&mut config);

        assert_eq!(config.endpoint_url, "http://127.0.0.1:9000/predict");
        assert_eq!(
            config.request_timeout,
            Some(std::time::Duration::from_secs(15))
        );
        assert_eq!(config.reveal_interval.as_millis(), 5);
        assert_eq!(config.source(), chat_core::ConfigSource::Cli);
    }

    #[test]
    fn test_no_args_no_overrides() {
        let args = Args::parse_from(["recipe-chat"]);
        assert!(args.overrides().is_empty());
    }
}
