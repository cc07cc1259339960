//! Configuration management for DocChat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{DocChatError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Sub-questions sent on every submission when the `battery` strategy is active
///
/// Each entry covers one category of tax-authority correspondence; the
/// backend persists a question/answer pair per entry.
pub const DEFAULT_QUESTIONS: [&str; 9] = [
    "¿El documento es sobre una solicitud de devolución de Saldo a Favor?",
    "¿El documento es sobre un requerimiento?",
    "¿El documento es sobre el impuesto sobre la renta?",
    "¿El documento es sobre el impuesto al valor agregado?",
    "¿El documento es sobre el impuesto sobre prodcucción y servicios?",
    "¿El documento es sobre retenciones de ISR?",
    "¿El documento es sobre retenciones de IVA?",
    "¿A que periodo hace referencia la solicitud de información?",
    "¿Que importe está sujeto a aclaración?",
];

/// Main configuration structure for DocChat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Message dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the document chat API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_user_agent() -> String {
    format!("docchat/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

/// Which questions a submission sends to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStrategy {
    /// Send the configured question battery; the typed prompt is only shown locally
    #[default]
    Battery,
    /// Send only the typed prompt
    Prompt,
    /// Send the battery followed by the typed prompt
    Both,
}

impl QuestionStrategy {
    /// Parse a strategy name (case-insensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::config::QuestionStrategy;
    ///
    /// assert_eq!(QuestionStrategy::parse_str("Prompt").unwrap(), QuestionStrategy::Prompt);
    /// assert!(QuestionStrategy::parse_str("everything").is_err());
    /// ```
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "battery" => Ok(Self::Battery),
            "prompt" => Ok(Self::Prompt),
            "both" => Ok(Self::Both),
            other => Err(DocChatError::Config(format!(
                "Invalid question strategy: {}. Must be one of: battery, prompt, both",
                other
            ))
            .into()),
        }
    }

    /// Lowercase name, also used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Battery => "battery",
            Self::Prompt => "prompt",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for QuestionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Which questions a submission sends
    #[serde(default)]
    pub strategy: QuestionStrategy,

    /// Question battery, sent in order
    #[serde(default = "default_questions")]
    pub questions: Vec<String>,

    /// Maximum requests in flight per submission
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Retries per question after the first failed attempt
    #[serde(default)]
    pub max_retries: u32,

    /// Base delay between retries (milliseconds), multiplied by the attempt number
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// The built-in question battery as owned strings
pub fn default_questions() -> Vec<String> {
    DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

fn default_max_concurrent() -> usize {
    16
}

fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            strategy: QuestionStrategy::default(),
            questions: default_questions(),
            max_concurrent: default_max_concurrent(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level for the `docchat` target when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON-formatted log lines
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// When `path` is `None` the per-user default location is used. A
    /// missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: Option<&str>, cli: &crate::cli::Cli) -> Result<Self> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_config_path);

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli)?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DocChatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| DocChatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("DOCCHAT_BASE_URL") {
            self.backend.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("DOCCHAT_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.backend.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid DOCCHAT_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(strategy) = std::env::var("DOCCHAT_STRATEGY") {
            match QuestionStrategy::parse_str(&strategy) {
                Ok(value) => self.dispatch.strategy = value,
                Err(_) => tracing::warn!("Invalid DOCCHAT_STRATEGY: {}", strategy),
            }
        }

        if let Ok(max_concurrent) = std::env::var("DOCCHAT_MAX_CONCURRENT") {
            if let Ok(value) = max_concurrent.parse() {
                self.dispatch.max_concurrent = value;
            } else {
                tracing::warn!("Invalid DOCCHAT_MAX_CONCURRENT: {}", max_concurrent);
            }
        }

        if let Ok(max_retries) = std::env::var("DOCCHAT_MAX_RETRIES") {
            if let Ok(value) = max_retries.parse() {
                self.dispatch.max_retries = value;
            } else {
                tracing::warn!("Invalid DOCCHAT_MAX_RETRIES: {}", max_retries);
            }
        }

        if let Ok(backoff) = std::env::var("DOCCHAT_RETRY_BACKOFF_MS") {
            if let Ok(value) = backoff.parse() {
                self.dispatch.retry_backoff_ms = value;
            } else {
                tracing::warn!("Invalid DOCCHAT_RETRY_BACKOFF_MS: {}", backoff);
            }
        }

        if let Ok(level) = std::env::var("DOCCHAT_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json_logs) = std::env::var("DOCCHAT_JSON_LOGS") {
            match json_logs.parse::<bool>() {
                Ok(v) => self.logging.json = v,
                Err(_) => tracing::warn!("Invalid value for DOCCHAT_JSON_LOGS: {}", json_logs),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) -> Result<()> {
        if let Some(base_url) = &cli.base_url {
            self.backend.base_url = base_url.clone();
        }
        if let Some(strategy) = &cli.strategy {
            self.dispatch.strategy = QuestionStrategy::parse_str(strategy)?;
        }
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `DocChatError::Config` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(DocChatError::Config("backend.base_url cannot be empty".to_string()).into());
        }

        if let Err(e) = url::Url::parse(&self.backend.base_url) {
            return Err(DocChatError::Config(format!(
                "backend.base_url is not a valid URL: {} ({})",
                self.backend.base_url, e
            ))
            .into());
        }

        if self.backend.timeout_seconds == 0 {
            return Err(DocChatError::Config(
                "backend.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.dispatch.strategy != QuestionStrategy::Prompt && self.dispatch.questions.is_empty()
        {
            return Err(DocChatError::Config(format!(
                "dispatch.questions cannot be empty with the {} strategy",
                self.dispatch.strategy
            ))
            .into());
        }

        if self.dispatch.questions.iter().any(|q| q.trim().is_empty()) {
            return Err(
                DocChatError::Config("dispatch.questions cannot contain blank entries".to_string())
                    .into(),
            );
        }

        if self.dispatch.max_concurrent == 0 {
            return Err(DocChatError::Config(
                "dispatch.max_concurrent must be greater than 0".to_string(),
            )
            .into());
        }

        if self.dispatch.max_retries > 10 {
            return Err(DocChatError::Config(
                "dispatch.max_retries must be less than or equal to 10".to_string(),
            )
            .into());
        }

        if self.dispatch.retry_backoff_ms > 60_000 {
            return Err(DocChatError::Config(
                "dispatch.retry_backoff_ms must be less than or equal to 60000".to_string(),
            )
            .into());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(DocChatError::Config(format!(
                "Invalid logging.level: {}. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}

/// Per-user configuration file location
///
/// Falls back to `config/config.yaml` when no home directory can be determined.
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "docchat")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from("config/config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.base_url, "http://localhost:3000");
        assert_eq!(config.backend.timeout_seconds, 120);
        assert_eq!(config.dispatch.strategy, QuestionStrategy::Battery);
        assert_eq!(config.dispatch.questions.len(), 9);
        assert_eq!(config.dispatch.max_retries, 0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_url() {
        let mut config = Config::default();
        config.backend.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_battery() {
        let mut config = Config::default();
        config.dispatch.questions.clear();
        assert!(config.validate().is_err());

        config.dispatch.strategy = QuestionStrategy::Prompt;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_blank_question() {
        let mut config = Config::default();
        config.dispatch.questions.push("   ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.dispatch.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_excessive_retries() {
        let mut config = Config::default();
        config.dispatch.max_retries = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bounds_retry_backoff() {
        let mut config = Config::default();
        config.dispatch.retry_backoff_ms = 60_000;
        assert!(config.validate().is_ok());
        config.dispatch.retry_backoff_ms = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_yaml_uses_defaults() {
        let yaml = r#"
backend:
  base_url: "https://api.example.com/prod"
dispatch:
  strategy: both
  questions:
    - "What is the period?"
  max_retries: 2
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.backend.base_url, "https://api.example.com/prod");
        assert_eq!(config.backend.timeout_seconds, 120);
        assert_eq!(config.dispatch.strategy, QuestionStrategy::Both);
        assert_eq!(config.dispatch.questions, vec!["What is the period?"]);
        assert_eq!(config.dispatch.max_retries, 2);
        assert_eq!(config.dispatch.max_concurrent, 16);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_strategy_parse_and_display() {
        assert_eq!(
            QuestionStrategy::parse_str(" BOTH ").unwrap(),
            QuestionStrategy::Both
        );
        assert_eq!(QuestionStrategy::Battery.to_string(), "battery");
        assert!(QuestionStrategy::parse_str("").is_err());
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        let config = Config::load(Some(path.to_str().unwrap()), &Cli::default()).unwrap();
        assert_eq!(config.dispatch.questions.len(), 9);
    }

    #[test]
    #[serial]
    fn test_load_from_file_with_env_and_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "backend:\n  base_url: \"http://file.example\"\n  timeout_seconds: 5").unwrap();

        std::env::set_var("DOCCHAT_TIMEOUT_SECONDS", "30");
        std::env::set_var("DOCCHAT_MAX_RETRIES", "3");

        let cli = Cli {
            base_url: Some("http://cli.example".to_string()),
            strategy: Some("prompt".to_string()),
            verbose: true,
            ..Cli::default()
        };
        let result = Config::load(Some(path.to_str().unwrap()), &cli);

        std::env::remove_var("DOCCHAT_TIMEOUT_SECONDS");
        std::env::remove_var("DOCCHAT_MAX_RETRIES");

        let config = result.unwrap();
        assert_eq!(config.backend.base_url, "http://cli.example");
        assert_eq!(config.backend.timeout_seconds, 30);
        assert_eq!(config.dispatch.max_retries, 3);
        assert_eq!(config.dispatch.strategy, QuestionStrategy::Prompt);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_ignored() {
        std::env::set_var("DOCCHAT_MAX_CONCURRENT", "many");
        let mut config = Config::default();
        config.apply_env_vars();
        std::env::remove_var("DOCCHAT_MAX_CONCURRENT");
        assert_eq!(config.dispatch.max_concurrent, 16);
    }

    #[test]
    fn test_invalid_cli_strategy_is_an_error() {
        let cli = Cli {
            strategy: Some("everything".to_string()),
            ..Cli::default()
        };
        let mut config = Config::default();
        assert!(config.apply_cli_overrides(&cli).is_err());
    }

    #[test]
    #[serial]
    fn test_load_rejects_malformed_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "backend: [unclosed").unwrap();
        assert!(Config::load(Some(path.to_str().unwrap()), &Cli::default()).is_err());
    }
}
