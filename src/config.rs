use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the retouch-ai library.
///
/// # Loading
///
/// ```rust,no_run
/// use retouch_ai::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.gemini.api_key = "AIza...".into();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gemini service configuration.
    pub gemini: GeminiConfig,
    /// Image fetched automatically when the app starts.
    pub default_image_url: String,
    /// Prompt the GUI pre-fills the edit box with. May be empty.
    pub default_prompt: String,
}

/// Google Gemini service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key. When empty, `GEMINI_API_KEY` from the environment is used.
    pub api_key: String,
    /// Model identifier, e.g. `"gemini-2.5-flash-image-preview"`.
    pub model: String,
}

impl GeminiConfig {
    /// The API key to use: the configured value, or the `GEMINI_API_KEY`
    /// environment variable when the configured one is empty.
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig {
                api_key: String::new(),
                model: "gemini-2.5-flash-image-preview".to_string(),
            },
            default_image_url:
                "https://storage.googleapis.com/static.a-shared-cache.net/31336a10-c466-4c45-8869-74d39360824b/original.webp"
                    .to_string(),
            default_prompt: String::new(),
        }
    }
}

impl Config {
    /// Resolve the config file path — same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(&config_path, contents).context("failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}
