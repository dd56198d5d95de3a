
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::OllamaConfig;
use crate::embeddings::{Embedding, EmbeddingProvider, check_batch};
use crate::{RagError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Embedding provider backed by an Ollama server's `/api/embed` endpoint
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: Url,
    model: String,
    batch_size: u32,
    dimension: usize,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff_unit: Duration,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &OllamaConfig, dimension: usize) -> Result<Self> {
        config.validate()?;
        let base_url = config.ollama_url()?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size,
            dimension,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff_unit: Duration::from_secs(1),
        })
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Base delay between retries; doubled after every failed attempt
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Test connection to the Ollama server and verify the model is available
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Checking Ollama at {} for model {}", self.base_url, self.model);

        let models = self.list_models()?;
        if !models.iter().any(|m| m.name == self.model) {
            let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} is not pulled on this server (have {:?})",
                self.model, available
            );
            return Err(RagError::Embedding(format!(
                "Ollama has no model '{}' (available: {:?})",
                self.model, available
            )));
        }

        info!(
            "Ollama at {} is serving {}",
            self.base_url, self.model
        );
        Ok(())
    }

    /// List all models the server has pulled
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;
        debug!("Listing models via {}", url);

        let response_text = self.make_request_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let models: ModelsResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Embedding(format!("Failed to parse models response: {}", e))
        })?;

        debug!("Found {} models", models.models.len());
        Ok(models.models)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RagError::Configuration(format!("Failed to build {} URL: {}", path, e)))
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let url = self.endpoint("/api/embed")?;
        let request_json = serde_json::to_string(&request).map_err(|e| {
            RagError::Embedding(format!("Failed to serialize embedding request: {}", e))
        })?;

        let response_text = self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Embedding(format!("Failed to parse embedding response: {}", e))
        })?;

        check_batch(self, texts.len(), &response.embeddings)?;
        Ok(response.embeddings)
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("Ollama request, attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(err) => {
                    let should_retry = match &err {
                        ureq::Error::StatusCode(status) if *status >= 500 => {
                            warn!(
                                "Server error (status {}), attempt {}/{}",
                                status, attempt, self.retry_attempts
                            );
                            true
                        }
                        ureq::Error::StatusCode(status) => {
                            warn!("Client error (status {}), not retrying", status);
                            false
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                err, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(RagError::Embedding(format!(
                            "Ollama request failed: {}",
                            err
                        )));
                    }

                    last_error = Some(err);

                    if attempt < self.retry_attempts {
                        let factor = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) as u32;
                        let delay = self.backoff_unit * factor;
                        debug!("Backing off for {:?}", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("Giving up on {} after {} attempts", self.base_url, self.retry_attempts);
        Err(RagError::Embedding(match last_error {
            Some(err) => format!("Ollama request failed after retries: {}", err),
            None => "Ollama request failed after retries".to_string(),
        }))
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut embeddings = self.embed_single_batch(&[text.to_string()])?;
        embeddings
            .pop()
            .ok_or_else(|| RagError::Embedding("Ollama returned no embedding".to_string()))
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} texts in batches of {}", texts.len(), self.batch_size);
        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            results.extend(self.embed_single_batch(batch)?);
        }

        debug!("Received {} embeddings", results.len());
        Ok(results)
    }

    #[inline]
    fn name(&self) -> &str {
        "ollama"
    }
}
