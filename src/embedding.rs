//! Text-to-vector embedding via an OpenAI-compatible HTTP API.
//!
//! The provider is stateless: it holds a configured HTTP client and maps
//! one text to one fixed-dimension vector per call. Deciding whether a
//! call is needed at all is the sync engine's job, which keeps this layer
//! trivially replaceable by a stub in tests.

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::{
    config::EmbeddingConfig,
    error::{Error, Result},
};

/// Turns text into a fixed-length float vector.
pub trait EmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Output dimension, constant for the provider's lifetime.
    fn dimension(&self) -> usize;

    fn model(&self) -> &str;
}

/// Blocking client for the OpenAI `/embeddings` endpoint.
///
/// Does not retry: rate limits and transient failures are reported as
/// typed errors and the caller decides whether and when to re-run.
pub struct OpenAiEmbeddings {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Auth(
                "no API key configured (set SITELENS_API_KEY)".into(),
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| Error::Auth("API key is not valid ASCII".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/embeddings",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }
}

impl EmbeddingProvider for OpenAiEmbeddings {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(
                "cannot embed empty text".into(),
            ));
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(map_status_error(status, body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| Error::Network(format!("malformed response: {e}")))?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| {
                Error::Network("response contained no embedding".into())
            })?;

        if vector.len() != self.dimension {
            return Err(Error::SchemaMismatch {
                expected: format!("{}-dimensional vector", self.dimension),
                found: format!("{}-dimensional vector", vector.len()),
            });
        }

        tracing::debug!(
            model = %self.model,
            chars = text.len(),
            "embedded text"
        );
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// The API key lives in the client's default headers; keep it out of
// Debug output.
impl std::fmt::Debug for OpenAiEmbeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddings")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

fn map_transport_error(err: reqwest::Error) -> Error {
    // Timeouts and connection failures are both transient from the
    // caller's perspective: retry with backoff.
    Error::Network(err.to_string())
}

fn map_status_error(status: StatusCode, body: String) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(body),
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited(body),
        StatusCode::PAYLOAD_TOO_LARGE => Error::InputTooLarge(body),
        StatusCode::BAD_REQUEST
            if body.contains("maximum context length")
                || body.contains("too long") =>
        {
            Error::InputTooLarge(body)
        }
        s if s.is_server_error() => Error::Network(format!("{status}: {body}")),
        _ => Error::Network(format!("{status}: {body}")),
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
