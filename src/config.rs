use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use critiquer::critique::{DEFAULT_CRITIQUE_TYPE, DEFAULT_ITERATIONS, DEFAULT_MODEL};
use critiquer::llm::{
    DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_DELAYS_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_REFERER,
    OpenRouterConfig, RetryPolicy,
};
use critiquer::storage::DEFAULT_STORE_FILE;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub api: ApiConfig,
    pub models: ModelsConfig,
    pub critique: CritiqueConfig,
    pub retry: RetryConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub referer: String,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            timeout_ms: 300000,
        }
    }
}

impl ApiConfig {
    pub fn to_openrouter(&self) -> OpenRouterConfig {
        OpenRouterConfig {
            base_url: self.base_url.clone(),
            api_key_env: self.api_key_env.clone(),
            referer: self.referer.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub primary: String,
    pub critic_a: String,
    pub critic_b: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            primary: DEFAULT_MODEL.to_string(),
            critic_a: DEFAULT_MODEL.to_string(),
            critic_b: DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CritiqueConfig {
    pub prompt: Option<String>,
    pub iterations: u32,
    pub critique_type: String,
    pub include_reasoning: bool,
}

impl Default for CritiqueConfig {
    fn default() -> Self {
        Self {
            prompt: None,
            iterations: DEFAULT_ITERATIONS,
            critique_type: DEFAULT_CRITIQUE_TYPE.to_string(),
            include_reasoning: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delays_secs: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delays_secs: DEFAULT_DELAYS_SECS.to_vec(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(self.max_attempts, &self.delays_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub output_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_file: PathBuf::from(DEFAULT_STORE_FILE),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            api: ApiConfig::default(),
            models: ModelsConfig::default(),
            critique: CritiqueConfig::default(),
            retry: RetryConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
