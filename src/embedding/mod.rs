//! Embedding clients for the ingestion pipeline.
//!
//! The pipeline talks to embedding backends through one narrow contract: a
//! batch of chunk texts in, one vector per text out, in the same order. Two
//! remote wire shapes are supported (text-embeddings-inference and
//! OpenAI-compatible endpoints) plus a deterministic local hasher for tests
//! and air-gapped runs. Batching is the caller's concern; the ingestion
//! service sends one document's chunks per call.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, EmbeddingProvider};

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider base URL could not be parsed.
    #[error("Invalid embedding endpoint: {0}")]
    InvalidUrl(String),
    /// HTTP transport failed before a response arrived.
    #[error("Embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider answered with an unexpected status code.
    #[error("Unexpected embedding response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider returned a body that does not map back onto the request.
    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),
}

/// Interface implemented by embedding backends.
///
/// Implementations return exactly one vector per input text, preserving
/// input order.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

enum Flavor {
    Tei,
    OpenAi { model: String },
}

/// Embedding client speaking to a remote HTTP endpoint.
///
/// Construct with [`RestEmbeddingClient::tei`] for a text-embeddings-inference
/// server or [`RestEmbeddingClient::openai`] for an OpenAI-compatible API.
pub struct RestEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    flavor: Flavor,
}

impl RestEmbeddingClient {
    /// Client for a text-embeddings-inference server (`POST {base}/embed`).
    pub fn tei(base_url: &str, api_key: Option<String>) -> Result<Self, EmbeddingClientError> {
        Self::build(base_url, api_key, Flavor::Tei)
    }

    /// Client for an OpenAI-compatible endpoint (`POST {base}/v1/embeddings`).
    pub fn openai(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
    ) -> Result<Self, EmbeddingClientError> {
        Self::build(
            base_url,
            api_key,
            Flavor::OpenAi {
                model: model.to_string(),
            },
        )
    }

    fn build(
        base_url: &str,
        api_key: Option<String>,
        flavor: Flavor,
    ) -> Result<Self, EmbeddingClientError> {
        let parsed = reqwest::Url::parse(base_url)
            .map_err(|err| EmbeddingClientError::InvalidUrl(format!("{base_url}: {err}")))?;
        Ok(Self {
            client: Client::new(),
            base_url: parsed.to_string().trim_end_matches('/').to_string(),
            api_key,
            flavor,
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.post(format!("{}/{path}", self.base_url));
        if let Some(key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            request = request.bearer_auth(key);
        }
        request
    }

    async fn embed_tei(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let response = self
            .post("embed")
            .json(&json!({ "inputs": texts }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        Ok(response.json().await?)
    }

    async fn embed_openai(
        &self,
        model: &str,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let requested = texts.len();
        let response = self
            .post("v1/embeddings")
            .json(&json!({ "model": model, "input": texts }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }

        let body: OpenAiEmbeddingsResponse = response.json().await?;
        // The API is free to reorder items; `index` restores request order.
        let mut vectors: Vec<Option<Vec<f32>>> = (0..requested).map(|_| None).collect();
        for item in body.data {
            let slot = vectors.get_mut(item.index).ok_or_else(|| {
                EmbeddingClientError::MalformedResponse(format!(
                    "embedding index {} out of range for {requested} inputs",
                    item.index
                ))
            })?;
            *slot = Some(item.embedding);
        }
        vectors
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    EmbeddingClientError::MalformedResponse(format!(
                        "no embedding returned for input {index}"
                    ))
                })
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingClient for RestEmbeddingClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let requested = texts.len();
        tracing::debug!(batch = requested, "Requesting embeddings");

        let vectors = match &self.flavor {
            Flavor::Tei => self.embed_tei(texts).await?,
            Flavor::OpenAi { model } => self.embed_openai(model, texts).await?,
        };
        if vectors.len() != requested {
            return Err(EmbeddingClientError::MalformedResponse(format!(
                "requested {requested} embeddings, got {}",
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

async fn unexpected_status(response: reqwest::Response) -> EmbeddingClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    EmbeddingClientError::UnexpectedStatus { status, body }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingsResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

/// Deterministic embedding client that hashes bytes into a normalized vector.
///
/// The same text always maps to the same vector, so re-ingestion stays
/// idempotent end to end without a remote model. Not semantically meaningful;
/// intended for tests and offline smoke runs.
pub struct HashedEmbeddingClient {
    dimension: usize,
}

impl HashedEmbeddingClient {
    /// Build a client emitting vectors with `dimension` components.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];
        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % self.dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashedEmbeddingClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }
}

/// Build the embedding client matching the configured provider.
pub fn client_from_config(config: &Config) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    match config.embedding_provider {
        EmbeddingProvider::Tei => {
            let url = remote_url(config)?;
            Ok(Arc::new(RestEmbeddingClient::tei(
                url,
                config.embedding_api_key.clone(),
            )?))
        }
        EmbeddingProvider::OpenAI => {
            let url = remote_url(config)?;
            Ok(Arc::new(RestEmbeddingClient::openai(
                url,
                config.embedding_api_key.clone(),
                &config.embedding_model,
            )?))
        }
        EmbeddingProvider::Hashed => {
            Ok(Arc::new(HashedEmbeddingClient::new(config.embedding_dimension)))
        }
    }
}

fn remote_url(config: &Config) -> Result<&str, EmbeddingClientError> {
    config
        .embedding_url
        .as_deref()
        .ok_or_else(|| EmbeddingClientError::InvalidUrl("EMBEDDING_URL is not set".to_string()))
}
