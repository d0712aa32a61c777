use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ChatError;
use crate::models::{DEFAULT_TEXT_MODEL, DEFAULT_VISION_MODEL};
use crate::prompts::DEFAULT_SYSTEM_PROMPT;

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "CHATLINE_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key stored alongside the config (the environment takes precedence)
    pub api_key: Option<String>,

    /// Model selected at startup
    pub default_model: String,

    /// Model substituted when an image is sent to a text-only model
    pub vision_model: String,

    /// System prompt prepended to every request
    pub system_prompt: String,

    pub temperature: f32,

    pub max_tokens: u32,

    /// Model provider configuration
    pub provider: ModelProvider,

    /// UI preferences
    pub ui: UiConfig,
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelProvider {
    pub name: String,
    pub base_url: String,
    pub api_key_env: String,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub theme: String,
    pub code_wrap: bool,
    pub show_previews: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            default_model: DEFAULT_TEXT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            provider: ModelProvider::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for ModelProvider {
    fn default() -> Self {
        ModelProvider {
            name: "Groq".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            theme: "dark".to_string(),
            code_wrap: true,
            show_previews: true,
        }
    }
}

impl Config {
    /// Directory holding the config file and the TUI log
    pub fn home_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".chatline"))
    }

    /// Config file location, honouring `CHATLINE_CONFIG`
    pub fn default_path() -> Result<PathBuf> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Ok(Self::home_dir()?.join("config.toml")),
        }
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load configuration from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ChatError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ChatError::Config(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ChatError::Config("max_tokens must be positive".to_string()));
        }
        if self.default_model.trim().is_empty() || self.vision_model.trim().is_empty() {
            return Err(ChatError::Config("model ids must not be empty".to_string()));
        }
        Ok(())
    }

    /// Get API key from environment or config
    pub fn api_key(&self) -> Result<String, ChatError> {
        let from_env = std::env::var(&self.provider.api_key_env).ok();
        self.pick_api_key(from_env)
    }

    /// Environment value first, then the config file; blank values don't count.
    pub fn pick_api_key(&self, from_env: Option<String>) -> Result<String, ChatError> {
        from_env
            .into_iter()
            .chain(self.api_key.clone())
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
            .ok_or_else(|| ChatError::MissingApiKey {
                env_var: self.provider.api_key_env.clone(),
            })
    }
}

/// Export `KEY=value` pairs from a `.env` file in the working directory or
/// one of its parents; variables already set in the environment win.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}
