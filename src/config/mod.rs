// Configuration management module
// TOML settings for storage paths, chunking, search bounds and the embedding provider

pub mod settings;

pub use settings::{
    Config, ConfigError, EmbeddingBackend, EmbeddingConfig, OllamaConfig, SearchConfig,
    StorageConfig,
};

