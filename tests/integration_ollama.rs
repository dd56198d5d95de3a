#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use rag_index::config::{Config, EmbeddingBackend, OllamaConfig};
use rag_index::embeddings::{EmbeddingProvider, OllamaEmbedder};
use rag_index::{Document, RagEngine};
use std::env;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

const TEST_MODEL: &str = "all-minilm:latest";
const TEST_DIMENSION: usize = 384;
const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn test_ollama_config() -> OllamaConfig {
    let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    let port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);
    let model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| TEST_MODEL.to_string());

    OllamaConfig {
        host,
        port,
        model,
        batch_size: 2,
        ..OllamaConfig::default()
    }
}

fn create_integration_test_embedder() -> OllamaEmbedder {
    OllamaEmbedder::new(&test_ollama_config(), TEST_DIMENSION)
        .expect("Failed to create Ollama embedder")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(3)
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let embedder = create_integration_test_embedder();
    let result = embedder.health_check();

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_list_models() {
    init_test_tracing();

    let embedder = create_integration_test_embedder();
    let models = embedder.list_models().expect("model listing should succeed");

    assert!(
        !models.is_empty(),
        "Should have at least one model available"
    );
    for model in &models {
        debug!("Available model: {} (size: {:?})", model.name, model.size);
    }
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_batch_embeddings_are_deterministic() {
    init_test_tracing();

    let embedder = create_integration_test_embedder();
    let texts = vec![
        "La tour Eiffel mesure 324m de haut.".to_string(),
        "Rust enforces memory safety through ownership.".to_string(),
        "The Louvre is the most visited museum in the world.".to_string(),
    ];

    let first = embedder
        .embed_batch(&texts)
        .expect("batch embedding should succeed");
    let second = embedder
        .embed_batch(&texts)
        .expect("batch embedding should succeed");

    assert_eq!(first.len(), texts.len());
    assert!(first.iter().all(|e| e.len() == TEST_DIMENSION));
    assert_eq!(first, second);
    info!("Embedded {} texts", first.len());
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_engine_round_trip() {
    init_test_tracing();

    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::with_base_dir(temp_dir.path());
    config.embedding.provider = EmbeddingBackend::Ollama;
    config.embedding.dimension = TEST_DIMENSION as u32;
    config.ollama = test_ollama_config();

    let mut engine = RagEngine::from_config(&config).expect("engine should open");
    engine
        .add(&[
            Document::new(
                "1",
                "Tour Eiffel",
                "http://example.com/2",
                "La tour Eiffel mesure 324m de haut et est située à Paris.",
            ),
            Document::new(
                "2",
                "Rust",
                "http://example.com/rust",
                "Rust enforces memory safety through ownership and borrowing.",
            ),
        ])
        .expect("add should succeed");

    let hits = engine
        .search_hits("hauteur tour Eiffel", 1)
        .expect("search should succeed");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.title, "Tour Eiffel");
}
