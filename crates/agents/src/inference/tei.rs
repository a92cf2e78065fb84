//! Text embedding client (TEI or Ollama) for the restaurant text index.

use super::{env_or_default, env_parse_or, trim_url};
use crate::{AgentError, Result};
use foodfinder_db::schema::TEXT_DIMENSION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_TEI_URL: &str = "http://localhost:8081";
const DEFAULT_TEI_PROVIDER: &str = "tei";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_EMBED_MODEL: &str = "nomic-embed-text:latest";
const DEFAULT_TEI_MAX_BATCH: usize = 32;
const DEFAULT_TEI_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TeiProvider {
    Tei,
    Ollama,
}

/// Client for a sentence-embedding server producing 768-dim vectors
#[derive(Clone)]
pub struct TeiClient {
    client: Client,
    base_url: String,
    provider: TeiProvider,
    model: String,
    max_batch: usize,
}

impl TeiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            base_url: trim_url(base_url.into()),
            provider: TeiProvider::Tei,
            model: DEFAULT_OLLAMA_EMBED_MODEL.to_string(),
            max_batch: DEFAULT_TEI_MAX_BATCH,
        }
    }

    /// Ollama `/api/embeddings` backend with the given model
    pub fn ollama(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: TeiProvider::Ollama,
            model: model.into(),
            ..Self::new(base_url)
        }
    }

    /// Build from `TEI_PROVIDER`, `TEI_URL`, `TEI_MODEL` and `TEI_MAX_BATCH`
    pub fn default_local() -> Self {
        let provider = env_or_default("TEI_PROVIDER", DEFAULT_TEI_PROVIDER);
        let client = if provider.eq_ignore_ascii_case("ollama") {
            Self::ollama(
                env_or_default("TEI_URL", DEFAULT_OLLAMA_URL),
                env_or_default("TEI_MODEL", DEFAULT_OLLAMA_EMBED_MODEL),
            )
        } else {
            Self::new(env_or_default("TEI_URL", DEFAULT_TEI_URL))
        };
        client.with_max_batch(env_parse_or("TEI_MAX_BATCH", DEFAULT_TEI_MAX_BATCH))
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    /// Embed a single text
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = match self.provider {
            TeiProvider::Ollama => self.ollama_embed(text).await?,
            TeiProvider::Tei => {
                let url = format!("{}/embed", self.base_url);
                let request = TeiEmbedRequest {
                    inputs: text,
                    truncate: true,
                };

                let response = self
                    .client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<Value>()
                    .await?;

                parse_embedding_response(response)?
            }
        };

        validate_embedding_dim(embedding.len())?;
        Ok(embedding)
    }

    /// Embed many texts, splitting into server-sized chunks
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if self.provider == TeiProvider::Ollama {
            let mut results = Vec::with_capacity(texts.len());
            for text in texts {
                let embedding = self.ollama_embed(text).await?;
                validate_embedding_dim(embedding.len())?;
                results.push(embedding);
            }
            return Ok(results);
        }

        let url = format!("{}/embed", self.base_url);
        let mut results = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.max_batch) {
            let request = TeiEmbedBatchRequest {
                inputs: chunk,
                truncate: true,
            };

            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await?;

            let embeddings = parse_embeddings_response(response)?;
            if embeddings.len() != chunk.len() {
                return Err(AgentError::Embedding(format!(
                    "Server returned {} embeddings for {} texts",
                    embeddings.len(),
                    chunk.len()
                )));
            }
            for embedding in &embeddings {
                validate_embedding_dim(embedding.len())?;
            }
            debug!("Embedded chunk of {}", chunk.len());
            results.extend(embeddings);
        }

        Ok(results)
    }

    pub async fn health(&self) -> Result<bool> {
        let url = match self.provider {
            TeiProvider::Ollama => format!("{}/api/tags", self.base_url),
            TeiProvider::Tei => format!("{}/health", self.base_url),
        };
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn ollama_embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = OllamaEmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<OllamaEmbedResponse>()
            .await?;

        Ok(response.embedding)
    }
}

fn build_client() -> Client {
    let timeout = env_parse_or("TEI_TIMEOUT_SECS", DEFAULT_TEI_TIMEOUT_SECS);
    Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn validate_embedding_dim(len: usize) -> Result<()> {
    if len != TEXT_DIMENSION {
        return Err(AgentError::Embedding(format!(
            "Embedding dimension {} does not match expected {}. Serve a 768-dim model such as all-mpnet-base-v2.",
            len, TEXT_DIMENSION
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct TeiEmbedRequest<'a> {
    inputs: &'a str,
    truncate: bool,
}

#[derive(Serialize)]
struct TeiEmbedBatchRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embedding: Vec<f32>,
}

fn parse_embedding_response(value: Value) -> Result<Vec<f32>> {
    match value {
        Value::Array(items) => {
            let nested = items.first().map(Value::is_array).unwrap_or(false);
            let target = if nested {
                items.into_iter().next().unwrap_or(Value::Null)
            } else {
                Value::Array(items)
            };
            serde_json::from_value(target).map_err(|e| {
                AgentError::Embedding(format!("Invalid TEI embedding array: {}", e))
            })
        }
        other => Err(AgentError::Embedding(format!(
            "Unexpected TEI response format: {}",
            other
        ))),
    }
}

fn parse_embeddings_response(value: Value) -> Result<Vec<Vec<f32>>> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Ok(Vec::new());
            }
            if items.first().map(Value::is_array).unwrap_or(false) {
                serde_json::from_value(Value::Array(items)).map_err(|e| {
                    AgentError::Embedding(format!("Invalid TEI embeddings response: {}", e))
                })
            } else {
                let single: Vec<f32> = serde_json::from_value(Value::Array(items)).map_err(|e| {
                    AgentError::Embedding(format!("Invalid TEI embedding array: {}", e))
                })?;
                Ok(vec![single])
            }
        }
        other => Err(AgentError::Embedding(format!(
            "Unexpected TEI response format: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vector(value: f32) -> Vec<f32> {
        vec![value; TEXT_DIMENSION]
    }

    #[tokio::test]
    async fn test_embed_single() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([vector(0.5)])))
            .mount(&server)
            .await;

        let client = TeiClient::new(server.uri());
        let embedding = client.embed("pizza place").await.unwrap();

        assert_eq!(embedding.len(), TEXT_DIMENSION);
        assert_eq!(embedding[0], 0.5);
    }

    #[tokio::test]
    async fn test_embed_batch_chunks_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([vector(0.1), vector(0.2)])),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = TeiClient::new(server.uri()).with_max_batch(2);
        let texts: Vec<String> = (0..4).map(|i| format!("text {}", i)).collect();
        let embeddings = client.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 4);
    }

    #[tokio::test]
    async fn test_embed_rejects_wrong_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([[0.1, 0.2, 0.3]])))
            .mount(&server)
            .await;

        let client = TeiClient::new(server.uri());
        let err = client.embed("sushi").await.unwrap_err();

        assert!(matches!(err, AgentError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_ollama_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "embedding": vector(0.3) })),
            )
            .mount(&server)
            .await;

        let client = TeiClient::ollama(server.uri(), "nomic-embed-text");
        let embeddings = client
            .embed_batch(&["tacos".to_string(), "ramen".to_string()])
            .await
            .unwrap();

        assert_eq!(embeddings.len(), 2);
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(TeiClient::new(server.uri()).health().await.unwrap());
    }

    #[test]
    fn test_parse_flat_embedding() {
        let parsed = parse_embedding_response(json!([1.0, 2.0])).unwrap();
        assert_eq!(parsed, vec![1.0, 2.0]);
    }
}
