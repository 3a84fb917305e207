use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat-completions endpoint
    pub endpoint: String,

    /// Model name sent with every request
    pub model: String,

    /// Bearer credential. Prefer `api_key_env` over storing it here.
    pub api_key: Option<String>,

    /// Environment variable holding the bearer credential
    pub api_key_env: String,

    /// Generation parameters sent with every turn
    pub generation: GenerationConfig,

    /// Path or http(s) URL of the rentals JSON document
    pub listings: String,

    pub request_timeout_secs: u64,

    /// Application home directory (not serialized)
    #[serde(skip)]
    pub home: PathBuf,
}

/// Fixed generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            generation: GenerationConfig::default(),
            listings: "data/rentals.json".to_string(),
            request_timeout_secs: 60,
            home: home.join(".rental-chat"),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `~/.rental-chat/config.toml`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let home = dirs::home_dir()
            .context("Could not find home directory")?
            .join(".rental-chat");
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => home.join("config.toml"),
        };

        let mut config = Self::load_file(&config_path)?;
        config.home = home;
        Ok(config)
    }

    fn load_file(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            log::debug!("No config at {}, using defaults", config_path.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))
    }

    /// Ensure the application home directory exists
    pub fn ensure_home(&self) -> Result<()> {
        fs::create_dir_all(&self.home)
            .context("Failed to create .rental-chat directory")?;
        Ok(())
    }

    /// Where the chat panel writes its log
    pub fn log_path(&self) -> PathBuf {
        self.home.join("rental-chat.log")
    }

    /// Check if API key is configured
    pub fn has_api_key(&self) -> bool {
        self.get_api_key().is_some()
    }

    /// Get API key from config or environment. A blank value counts as unset.
    pub fn get_api_key(&self) -> Option<String> {
        let present = |key: &String| !key.trim().is_empty();
        self.api_key
            .clone()
            .filter(present)
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(present))
    }
}
