
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::hashing::DEFAULT_HASHING_DIMENSION;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_INDEX_FILE_NAME: &str = "faiss_index";
pub const HOME_ENV_VAR: &str = "RAG_INDEX_HOME";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Base path of the persisted index; the metadata sidecar sits next to it
    pub index_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from(DEFAULT_INDEX_FILE_NAME),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    pub default_k: usize,
    pub max_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: 3,
            max_k: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Hashing,
    Ollama,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingBackend,
    pub dimension: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Hashing,
            dimension: DEFAULT_HASHING_DIMENSION as u32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "all-minilm:latest".to_string(),
            batch_size: 16,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be greater than zero)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid default k: {0} (must be between 1 and max_k = {1})")]
    InvalidDefaultK(usize, usize),
    #[error("Index path cannot be empty")]
    EmptyIndexPath,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration rooted at `base_dir`
    #[inline]
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when it does not exist
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::with_base_dir(config_dir));
        }

        let content = fs::read_to_string(&config_path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.base_dir = config_dir.as_ref().to_path_buf();
        config.validate()?;

        Ok(config)
    }

    /// Load from the default configuration directory
    #[inline]
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(Self::config_dir()?)
    }

    #[inline]
    pub fn save(&self) -> Result<(), ConfigError> {
        self.validate()?;

        fs::create_dir_all(&self.base_dir)?;
        let content = toml::to_string_pretty(self)?;
        fs::write(self.config_file_path(), content)?;

        Ok(())
    }

    /// The configuration directory: `$RAG_INDEX_HOME` if set, else `~/.rag-index`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(HOME_ENV_VAR).filter(|dir| !dir.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        dirs::home_dir()
            .map(|home| home.join(".rag-index"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE_NAME)
    }

    /// Base path of the persisted index, resolved against the config directory
    #[inline]
    pub fn index_path(&self) -> PathBuf {
        if self.storage.index_path.is_absolute() {
            self.storage.index_path.clone()
        } else {
            self.base_dir.join(&self.storage.index_path)
        }
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }

    /// Clamp a caller-supplied `k` to `1..=max_k`, using `default_k` when absent
    #[inline]
    pub fn effective_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.search.default_k)
            .clamp(1, self.search.max_k.max(1))
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.index_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyIndexPath);
        }
        self.chunking.validate()?;
        self.validate_search_config()?;

        if !(64..=4096).contains(&self.embedding.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding.dimension,
            ));
        }

        if self.embedding.provider == EmbeddingBackend::Ollama {
            self.ollama.validate()?;
        }
        Ok(())
    }

    fn validate_search_config(&self) -> Result<(), ConfigError> {
        let search = &self.search;
        if search.default_k == 0 || search.default_k > search.max_k {
            return Err(ConfigError::InvalidDefaultK(search.default_k, search.max_k));
        }
        Ok(())
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}
