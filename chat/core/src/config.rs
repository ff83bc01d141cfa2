//! TOML Configuration File Support
//!
//! Centralized configuration loading for a chat session, supporting a TOML
//! configuration file at `~/.config/recipe-chat/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [endpoint]
//! url = "http://localhost:8000/predict"
//! timeout_secs = 30
//!
//! [reveal]
//! interval_ms = 30
//!
//! [session]
//! store_path = "/home/me/.local/share/recipe-chat/session.json"
//! event_capacity = 256
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::DEFAULT_ENDPOINT_URL;
use crate::reveal::DEFAULT_REVEAL_INTERVAL;

/// Endpoint URL override
pub const ENV_ENDPOINT: &str = "RECIPE_CHAT_ENDPOINT";
/// Request timeout override, in seconds
pub const ENV_TIMEOUT_SECS: &str = "RECIPE_CHAT_TIMEOUT_SECS";
/// Reveal interval override, in milliseconds
pub const ENV_REVEAL_MS: &str = "RECIPE_CHAT_REVEAL_MS";
/// Session store path override
pub const ENV_STORE: &str = "RECIPE_CHAT_STORE";

/// Default outbound event channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 256;
/// Smallest usable event channel capacity
///
/// One submission emits up to nine events before the surface can drain any.
pub const MIN_EVENT_CAPACITY: usize = 16;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Endpoint section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointToml {
    /// Answer endpoint URL
    pub url: Option<String>,

    /// Request timeout in seconds (absent = wait forever)
    pub timeout_secs: Option<u64>,
}

/// Reveal section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealToml {
    /// Per-character reveal interval in milliseconds
    pub interval_ms: Option<u64>,
}

/// Session section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Path of the persisted sign-in store
    pub store_path: Option<PathBuf>,

    /// Capacity of the outbound event channel
    pub event_capacity: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Endpoint configuration section
    pub endpoint: EndpointToml,

    /// Reveal configuration section
    pub reveal: RevealToml,

    /// Session configuration section
    pub session: SessionToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Configuration for a chat session
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Answer endpoint URL
    pub endpoint_url: String,

    /// Per-character reveal interval
    pub reveal_interval: Duration,

    /// Endpoint request timeout; `None` waits indefinitely
    pub request_timeout: Option<Duration>,

    /// Capacity of the outbound event channel
    pub event_capacity: usize,

    /// Persisted sign-in store location; `None` uses the platform default
    pub store_path: Option<PathBuf>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    pub(crate) source: ConfigSource,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            reveal_interval: DEFAULT_REVEAL_INTERVAL,
            request_timeout: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            store_path: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ChatConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with environment overrides applied, no file
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        apply_env_config(&mut config);
        config
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that would break the session at runtime
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unparseable endpoint URL, a
    /// zero reveal interval or an event capacity below [`MIN_EVENT_CAPACITY`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.endpoint_url).map_err(|e| {
            ConfigError::Invalid(format!("endpoint url {:?}: {e}", self.endpoint_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "endpoint url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.reveal_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "reveal interval must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity < MIN_EVENT_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "event capacity must be at least {MIN_EVENT_CAPACITY}, got {}",
                self.event_capacity
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/recipe-chat/config.toml` or the platform
/// equivalent.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("recipe-chat").join("config.toml"))
}

/// Load configuration from all sources with proper priority
///
/// CLI overrides are not handled here; the caller applies them after.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed.
/// A missing config file is not an error (defaults are used).
pub async fn load_config() -> Result<ChatConfig, ConfigError> {
    load_config_from_path(default_config_path()).await
}

/// Load configuration from a specific path
///
/// With `None`, only defaults and environment variables are used.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or parsed.
pub async fn load_config_from_path(path: Option<PathBuf>) -> Result<ChatConfig, ConfigError> {
    let mut config = ChatConfig::default();

    if let Some(ref config_path) = path {
        if let Some(toml_config) = read_toml(config_path).await? {
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Environment overrides file values
    apply_env_config(&mut config);

    Ok(config)
}

async fn read_toml(path: &Path) -> Result<Option<ChatToml>, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    Ok(Some(toml::from_str(&content)?))
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ChatConfig, toml: &ChatToml) {
    if let Some(ref url) = toml.endpoint.url {
        config.endpoint_url.clone_from(url);
    }
    if let Some(secs) = toml.endpoint.timeout_secs {
        config.request_timeout = Some(Duration::from_secs(secs));
    }

    if let Some(ms) = toml.reveal.interval_ms {
        config.reveal_interval = Duration::from_millis(ms);
    }

    if toml.session.store_path.is_some() {
        config.store_path.clone_from(&toml.session.store_path);
    }
    if let Some(capacity) = toml.session.event_capacity {
        config.event_capacity = capacity;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut ChatConfig) {
    apply_env_lookup(config, |key| std::env::var(key).ok());
}

fn apply_env_lookup(config: &mut ChatConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_ENDPOINT).filter(|u| !u.is_empty()) {
        config.endpoint_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = lookup(ENV_TIMEOUT_SECS).and_then(|v| v.parse::<u64>().ok()) {
        config.request_timeout = Some(Duration::from_secs(secs));
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = lookup(ENV_REVEAL_MS).and_then(|v| v.parse::<u64>().ok()) {
        config.reveal_interval = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(path) = lookup(ENV_STORE).filter(|p| !p.is_empty()) {
        config.store_path = Some(PathBuf::from(path));
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Endpoint URL override
    pub endpoint_url: Option<String>,

    /// Request timeout override (seconds)
    pub timeout_secs: Option<u64>,

    /// Reveal interval override (milliseconds)
    pub reveal_ms: Option<u64>,

    /// Store path override
    pub store_path: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set endpoint URL override
    #[must_use]
    pub fn with_endpoint_url(mut self, url: String) -> Self {
        self.endpoint_url = Some(url);
        self
    }

    /// Set request timeout override
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set reveal interval override
    #[must_use]
    pub fn with_reveal_ms(mut self, ms: u64) -> Self {
        self.reveal_ms = Some(ms);
        self
    }

    /// Set store path override
    #[must_use]
    pub fn with_store_path(mut self, path: PathBuf) -> Self {
        self.store_path = Some(path);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoint_url.is_none()
            && self.timeout_secs.is_none()
            && self.reveal_ms.is_none()
            && self.store_path.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ChatConfig) {
        if !self.is_empty() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.endpoint_url {
            config.endpoint_url.clone_from(url);
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(ms) = self.reveal_ms {
            config.reveal_interval = Duration::from_millis(ms);
        }
        if self.store_path.is_some() {
            config.store_path.clone_from(&self.store_path);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_from<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();

        assert_eq!(config.endpoint_url, "http://localhost:8000/predict");
        assert_eq!(config.reveal_interval, Duration::from_millis(30));
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.store_path, None);
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.to_string_lossy().contains("recipe-chat"));
            assert!(p.to_string_lossy().ends_with("config.toml"));
        }
    }

    // =========================================================================
    // TOML Parsing Tests
    // =========================================================================

    #[tokio::test]
    async fn test_parse_valid_toml() {
        let toml_content = r#"
[endpoint]
url = "http://kitchen.local:9000/predict"
timeout_secs = 20

[reveal]
interval_ms = 10

[session]
store_path = "/tmp/recipe-chat/session.json"
event_capacity = 64
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let toml = read_toml(file.path()).await.unwrap().unwrap();
        let mut config = ChatConfig::default();
        apply_toml_config(&mut config, &toml);

        assert_eq!(config.endpoint_url, "http://kitchen.local:9000/predict");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(20)));
        assert_eq!(config.reveal_interval, Duration::from_millis(10));
        assert_eq!(
            config.store_path,
            Some(PathBuf::from("/tmp/recipe-chat/session.json"))
        );
        assert_eq!(config.event_capacity, 64);
    }

    #[tokio::test]
    async fn test_load_records_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[reveal]\ninterval_ms = 15\n").unwrap();

        let config = load_config_from_path(Some(file.path().to_path_buf()))
            .await
            .unwrap();

        assert_eq!(config.config_file_path, Some(file.path().to_path_buf()));
        if std::env::var(ENV_REVEAL_MS).is_err() {
            assert_eq!(config.reveal_interval, Duration::from_millis(15));
        }
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml: ChatToml = toml::from_str("[reveal]\ninterval_ms = 5\n").unwrap();
        let mut config = ChatConfig::default();
        apply_toml_config(&mut config, &toml);

        assert_eq!(config.reveal_interval, Duration::from_millis(5));
        assert_eq!(config.endpoint_url, DEFAULT_ENDPOINT_URL);
        assert_eq!(config.request_timeout, None);
    }

    #[tokio::test]
    async fn test_invalid_toml_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[endpoint\nurl = ").unwrap();

        let result = load_config_from_path(Some(file.path().to_path_buf())).await;
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(read_toml(&path).await.unwrap().is_none());

        let config = load_config_from_path(Some(path)).await.unwrap();
        assert!(config.config_file_path.is_none());
    }

    // =========================================================================
    // Environment and CLI Override Tests
    // =========================================================================

    #[test]
    fn test_env_overrides() {
        let vars = [
            (ENV_ENDPOINT, "https://recipes.example.com/predict"),
            (ENV_TIMEOUT_SECS, "12"),
            (ENV_REVEAL_MS, "not-a-number"),
            (ENV_STORE, ""),
        ];
        let mut config = ChatConfig::default();
        apply_env_lookup(&mut config, env_from(&vars));

        assert_eq!(config.endpoint_url, "https://recipes.example.com/predict");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(12)));
        // Unparseable values are ignored
        assert_eq!(config.reveal_interval, DEFAULT_REVEAL_INTERVAL);
        assert_eq!(config.store_path, None);
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_no_env_keeps_source() {
        let mut config = ChatConfig::default();
        apply_env_lookup(&mut config, |_| None);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = ChatConfig::default();
        let overrides = ConfigOverrides::new()
            .with_endpoint_url("http://127.0.0.1:8080/predict".to_string())
            .with_reveal_ms(1)
            .with_store_path(PathBuf::from("/tmp/session.json"));

        overrides.apply(&mut config);

        assert_eq!(config.endpoint_url, "http://127.0.0.1:8080/predict");
        assert_eq!(config.reveal_interval, Duration::from_millis(1));
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/session.json")));
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_overrides_keep_source() {
        let mut config = ChatConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    // =========================================================================
    // Validation Tests
    // =========================================================================

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_url = ChatConfig {
            endpoint_url: "not a url".to_string(),
            ..ChatConfig::default()
        };
        assert!(matches!(bad_url.validate(), Err(ConfigError::Invalid(_))));

        let bad_scheme = ChatConfig {
            endpoint_url: "ftp://localhost/predict".to_string(),
            ..ChatConfig::default()
        };
        assert!(matches!(bad_scheme.validate(), Err(ConfigError::Invalid(_))));

        let zero_interval = ChatConfig {
            reveal_interval: Duration::ZERO,
            ..ChatConfig::default()
        };
        assert!(matches!(
            zero_interval.validate(),
            Err(ConfigError::Invalid(_))
        ));

        for capacity in [0, MIN_EVENT_CAPACITY - 1] {
            let small_capacity = ChatConfig {
                event_capacity: capacity,
                ..ChatConfig::default()
            };
            assert!(matches!(
                small_capacity.validate(),
                Err(ConfigError::Invalid(_))
            ));
        }
    }
}
