use anyhow::{Context, Result, bail};
use console::style;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{Config, EmbeddingBackend};
use crate::database::persistence::{self, StoragePaths};
use crate::embeddings::OllamaEmbedder;
use crate::{Document, RagEngine};


/// A document as it appears in an input file, keyed by its id
#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentEntry {
    Fields {
        title: String,
        link: String,
        content: String,
    },
    /// `[title, link, content]`
    Positional(String, String, String),
}

/// Parse documents from JSON.
///
/// Accepts an object keyed by document id, whose values are either `{title, link, content}` or
/// `[title, link, content]`, or an array of `{doc_id, title, link, content}` objects. Input order
/// is preserved.
#[inline]
pub fn parse_documents(json: &str) -> Result<Vec<Document>> {
    let value: serde_json::Value = serde_json::from_str(json).context("Invalid JSON")?;

    match value {
        serde_json::Value::Object(entries) => entries
            .into_iter()
            .map(|(doc_id, entry)| -> Result<Document> {
                let entry: DocumentEntry = serde_json::from_value(entry).with_context(|| {
                    format!(
                        "Document '{}' must be {{title, link, content}} or [title, link, content]",
                        doc_id
                    )
                })?;
                Ok(match entry {
                    DocumentEntry::Fields {
                        title,
                        link,
                        content,
                    }
                    | DocumentEntry::Positional(title, link, content) => Document {
                        doc_id,
                        title,
                        link,
                        content,
                    },
                })
            })
            .collect(),
        serde_json::Value::Array(_) => {
            serde_json::from_value(value).context("Invalid document list")
        }
        _ => bail!("Expected a JSON object keyed by document id or an array of documents"),
    }
}

/// Read and parse a documents file
#[inline]
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let documents = parse_documents(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    debug!("Loaded {} documents from {}", documents.len(), path.display());
    Ok(documents)
}

/// Chunk, embed and index the documents in `path`
#[inline]
pub fn add_documents(config: &Config, path: &Path) -> Result<()> {
    let documents = load_documents(path)?;
    let mut engine = RagEngine::from_config(config).context("Failed to open index")?;

    info!("Adding {} documents", documents.len());
    let added = engine
        .add(&documents)
        .context("Failed to add documents")?;

    println!(
        "{} Added {} chunks from {} documents",
        style("✓").green(),
        added,
        documents.len()
    );
    println!("  Index now holds {} chunks", engine.size());
    Ok(())
}

/// Print the ranked context for `query`
#[inline]
pub fn search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let engine = RagEngine::from_config(config).context("Failed to open index")?;
    let k = config.effective_k(k);
    debug!("Searching {} rows for top {}", engine.size(), k);

    let output = engine.search(query, k).context("Search failed")?;
    println!("{}", output);
    Ok(())
}

/// Remove every indexed chunk
#[inline]
pub fn clear_index(config: &Config) -> Result<()> {
    let mut engine = RagEngine::from_config(config).context("Failed to open index")?;
    let removed = engine.size();
    engine.clear().context("Failed to clear index")?;

    println!("{} Removed {} chunks", style("✓").green(), removed);
    Ok(())
}

/// Report the state of the persisted index and the embedding provider
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    let paths = StoragePaths::new(config.index_path());

    println!("{}", style("📊 Index Status").bold().cyan());
    println!("{}", "=".repeat(50));
    println!();

    println!("{}", style("🗄️  Storage:").bold().yellow());
    println!("   Vector file: {}", style(paths.vectors.display()).dim());
    println!("   Metadata file: {}", style(paths.metadata.display()).dim());
    match persistence::inspect(&paths) {
        Ok(report) => {
            if report.is_consistent() {
                println!("   ✅ {}", report.summary());
            } else {
                println!("   ⚠️  {}", style(report.summary()).red());
            }
            if let Some(dimension) = report.dimension {
                println!("   📐 Dimension: {}", dimension);
            }
        }
        Err(e) => println!("   ❌ Could not read index: {}", e),
    }

    println!();
    println!("{}", style("🤖 Embedding Provider:").bold().yellow());
    match config.embedding.provider {
        EmbeddingBackend::Hashing => {
            println!("   ✅ Hashing ({} dimensions)", config.embedding.dimension);
        }
        EmbeddingBackend::Ollama => {
            println!(
                "   Ollama: {}:{} ({})",
                config.ollama.host, config.ollama.port, config.ollama.model
            );
            match OllamaEmbedder::new(&config.ollama, config.embedding.dimension as usize)
                .and_then(|embedder| embedder.health_check())
            {
                Ok(()) => println!("   ✅ Connected"),
                Err(e) => println!("   ❌ Unavailable - {}", e),
            }
        }
    }

    Ok(())
}

/// Print the effective configuration
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", style("📋 Current Configuration").bold().cyan());
    println!();

    println!("{}", style("Storage:").bold().yellow());
    println!("  Index path: {}", style(config.index_path().display()).cyan());

    println!("{}", style("Chunking:").bold().yellow());
    println!("  Chunk size: {}", style(config.chunking.chunk_size).cyan());
    println!("  Overlap: {}", style(config.chunking.chunk_overlap).cyan());

    println!("{}", style("Search:").bold().yellow());
    println!("  Default k: {}", style(config.search.default_k).cyan());
    println!("  Max k: {}", style(config.search.max_k).cyan());

    println!("{}", style("Embedding:").bold().yellow());
    println!(
        "  Provider: {}",
        style(format!("{:?}", config.embedding.provider).to_lowercase()).cyan()
    );
    println!("  Dimension: {}", style(config.embedding.dimension).cyan());

    if config.embedding.provider == EmbeddingBackend::Ollama {
        println!("{}", style("Ollama Settings:").bold().yellow());
        match config.ollama_url() {
            Ok(url) => println!("  URL: {}", style(url).cyan()),
            Err(e) => println!("  URL: {} ({})", style("Invalid").red(), e),
        }
        println!("  Model: {}", style(&config.ollama.model).cyan());
        println!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    }

    println!();
    println!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    Ok(())
}

/// Write `config` to its config file unless one already exists
#[inline]
pub fn write_config(config: &Config) -> Result<()> {
    let path = config.config_file_path();
    if path.exists() {
        println!(
            "Configuration already exists at {}",
            style(path.display()).cyan()
        );
        return Ok(());
    }

    config.save().context("Failed to save configuration")?;
    println!(
        "{} Wrote configuration to {}",
        style("✓").green(),
        style(path.display()).cyan()
    );
    Ok(())
}
