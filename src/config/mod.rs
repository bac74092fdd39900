//! Configuration management for rfpqa
//!
//! Loads the TOML configuration file, applies `RFPQA_SECTION__KEY` environment
//! overrides and named profiles, then validates the result.

use crate::error::{Result, RfpError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
}

impl StorageConfig {
    /// Full path of the SQLite database, with `~/` expanded
    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(expand_path(&self.data_dir)?.join(&self.database_file))
    }
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "openai", "azure", "local" or "disabled"
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub api_version: String,
    pub api_key_envs: Vec<String>,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

/// Generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub enabled: bool,
    /// "openai" or "azure"
    pub provider: String,
    /// Model name, or deployment name for Azure
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub api_version: String,
    pub api_key_envs: Vec<String>,
    pub timeout_secs: u64,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

/// Query-time defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_n: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_context_chars: usize,
    pub min_question_chars: usize,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
}

/// Wire dialect of an OpenAI-compatible HTTP backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    OpenAi,
    Azure,
}

impl ApiFlavor {
    pub fn parse(provider: &str) -> Option<Self> {
        match provider {
            "openai" => Some(Self::OpenAi),
            "azure" => Some(Self::Azure),
            _ => None,
        }
    }

    /// Build the request URL for an operation such as "embeddings" or "chat/completions"
    pub fn url(
        &self,
        endpoint: Option<&str>,
        model: &str,
        api_version: &str,
        operation: &str,
    ) -> Option<String> {
        match self {
            Self::OpenAi => {
                let base = endpoint.unwrap_or("https://api.openai.com/v1");
                Some(format!("{}/{}", base.trim_end_matches('/'), operation))
            }
            Self::Azure => endpoint.map(|base| {
                format!(
                    "{}/openai/deployments/{}/{}?api-version={}",
                    base.trim_end_matches('/'),
                    model,
                    operation,
                    api_version
                )
            }),
        }
    }

    /// Header name and value carrying the credential
    pub fn auth_header(&self, api_key: &str) -> (&'static str, String) {
        match self {
            Self::OpenAi => ("authorization", format!("Bearer {}", api_key.trim())),
            Self::Azure => ("api-key", api_key.trim().to_string()),
        }
    }
}

/// First non-empty value among the named environment variables
pub fn resolve_api_key(env_names: &[String]) -> Option<String> {
    env_names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RfpError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RfpError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| RfpError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| RfpError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(top_n) = overrides.top_n {
            self.retrieval.top_n = top_n;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: RFPQA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("RFPQA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "EMBEDDING__PROVIDER" => self.embedding.provider = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__ENDPOINT" => self.embedding.endpoint = Some(value.to_string()),
            "EMBEDDING__DIMENSION" => self.embedding.dimension = parse_env(path, value)?,
            "LLM__ENABLED" => self.llm.enabled = parse_env(path, value)?,
            "LLM__PROVIDER" => self.llm.provider = value.to_string(),
            "LLM__MODEL" => self.llm.model = value.to_string(),
            "LLM__ENDPOINT" => self.llm.endpoint = Some(value.to_string()),
            "RETRIEVAL__TOP_N" => self.retrieval.top_n = parse_env(path, value)?,
            "RETRIEVAL__TEMPERATURE" => self.retrieval.temperature = parse_env(path, value)?,
            "RETRIEVAL__MAX_TOKENS" => self.retrieval.max_tokens = parse_env(path, value)?,
            "STORAGE__DATA_DIR" => self.storage.data_dir = PathBuf::from(value),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RfpError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("rfpqa").join("config.toml"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| RfpError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| RfpError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| RfpError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

fn default_key_envs() -> Vec<String> {
    ["AZURE_OPENAI_API_KEY", "AZURE_OPENAI_KEY", "OPENAI_API_KEY"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.rfpqa"),
                database_file: "rfpqa.sqlite".to_string(),
            },
            embedding: EmbeddingConfig {
                provider: "openai".to_string(),
                model: "text-embedding-3-large".to_string(),
                dimension: 3072,
                endpoint: None,
                api_version: "2024-02-01".to_string(),
                api_key_envs: default_key_envs(),
                batch_size: 16,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                enabled: true,
                provider: "openai".to_string(),
                model: "gpt-4o".to_string(),
                endpoint: None,
                api_version: "2024-02-01".to_string(),
                api_key_envs: default_key_envs(),
                timeout_secs: 60,
                top_p: 0.95,
                frequency_penalty: 0.3,
                presence_penalty: 0.3,
            },
            retrieval: RetrievalConfig {
                top_n: 10,
                temperature: 0.3,
                max_tokens: 2000,
                max_context_chars: 24_000,
                min_question_chars: 3,
            },
            profiles: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.retrieval.top_n = 7;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieval.top_n, 7);
        assert_eq!(loaded.embedding.dimension, 3072);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/rfpqa/config.toml"));
        assert!(matches!(result, Err(RfpError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_profile_overrides() {
        let mut config = Config::default();
        config.profiles.insert(
            "offline".to_string(),
            ProfileOverrides {
                embedding_provider: Some("disabled".to_string()),
                llm_enabled: Some(false),
                top_n: None,
            },
        );

        config.apply_profile("offline").unwrap();
        assert_eq!(config.embedding.provider, "disabled");
        assert!(!config.llm.enabled);
        assert_eq!(config.retrieval.top_n, 10);

        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_env_value_parsing() {
        let mut config = Config::default();
        config.set_value_from_env("RETRIEVAL__TOP_N", "4").unwrap();
        assert_eq!(config.retrieval.top_n, 4);
        assert!(config.set_value_from_env("LLM__ENABLED", "maybe").is_err());
    }

    #[test]
    fn test_api_urls() {
        let openai = ApiFlavor::OpenAi
            .url(None, "gpt-4o", "2024-02-01", "chat/completions")
            .unwrap();
        assert_eq!(openai, "https://api.openai.com/v1/chat/completions");

        let azure = ApiFlavor::Azure
            .url(
                Some("https://example.openai.azure.com/"),
                "text-embedding-3-large",
                "2024-02-01",
                "embeddings",
            )
            .unwrap();
        assert_eq!(
            azure,
            "https://example.openai.azure.com/openai/deployments/text-embedding-3-large/embeddings?api-version=2024-02-01"
        );

        assert!(ApiFlavor::Azure.url(None, "m", "v", "embeddings").is_none());
    }
}
