use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ai::providers::ProviderKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub interactive: InteractiveConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Connection and prompt settings for the LLM endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Wire format: "openai" (chat completions) or "ollama" (generate)
    #[serde(default)]
    pub provider: ProviderKind,
    /// Base URL, e.g. "https://api.openai.com/v1" or "http://localhost:11434"
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    /// System prompt sent with every summary request
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: String::new(),
            api_key: String::new(),
            model: String::new(),
            system_prompt: String::new(),
            max_completion_tokens: default_max_completion_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl ProviderConfig {
    /// Check that every field a request needs is present.
    ///
    /// A failure here is a configuration problem, never a transient one.
    pub fn validate(&self) -> crate::Result<()> {
        let required = [
            ("base_url", &self.base_url),
            ("api_key", &self.api_key),
            ("model", &self.model),
            ("system_prompt", &self.system_prompt),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(crate::Error::Config(format!(
                "missing provider settings: {}",
                missing.join(", ")
            )));
        }

        url::Url::parse(self.base_url.trim())
            .map_err(|e| crate::Error::Config(format!("invalid base_url: {}", e)))?;

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveConfig {
    /// Total attempts for opening a summary request (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, doubled after each failure
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_retry_delay_ms: default_initial_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Feeds whose entries may be summarized automatically (empty = none)
    #[serde(default)]
    pub feeds: Vec<String>,
    /// Entries with a shorter estimated reading time are left alone
    #[serde(default = "default_min_reading_time")]
    pub min_reading_time_mins: u32,
    /// Stop a run after this many summaries were saved
    #[serde(default = "default_max_summaries")]
    pub max_summaries_per_run: u32,
    /// Number of candidate entries loaded per run
    #[serde(default = "default_max_entries")]
    pub max_entries_per_run: u32,
    /// Timeout for a single provider call
    #[serde(default = "default_batch_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            min_reading_time_mins: default_min_reading_time(),
            max_summaries_per_run: default_max_summaries(),
            max_entries_per_run: default_max_entries(),
            request_timeout_secs: default_batch_timeout(),
        }
    }
}

impl BatchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("summarist")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_completion_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    1.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_retry_delay() -> u64 {
    1000
}

fn default_min_reading_time() -> u32 {
    5
}

fn default_max_summaries() -> u32 {
    10
}

fn default_max_entries() -> u32 {
    50
}

fn default_batch_timeout() -> u64 {
    60
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from the default location or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit file; a missing file yields defaults
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Always ~/.config/summarist/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("summarist")
            .join("config.toml")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("summarist.db")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}
