use std::time::Duration;

use crate::error::{Error, Result};

/// Default embedding model when nothing is configured.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default upper bound on tokens per embedding input.
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 8000;

/// Default HTTP timeout for a single embedding call.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Output dimension for known embedding models.
///
/// The vector store fixes its dimension on first insert, so the provider
/// must know the dimension up front rather than discovering it per call.
pub fn model_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// Validated embedding configuration.
///
/// Every recognized knob is an explicit typed field with a default; unknown
/// or malformed values fail at load time rather than deep inside a sync run.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Fixed output dimension of `model`.
    pub dimension: usize,
    /// Upper bound on tokens per embedding input; longer text is truncated
    /// to its first chunk before the API call.
    pub max_input_tokens: usize,
    pub timeout: Duration,
}

impl EmbeddingConfig {
    /// Build a config from the environment plus optional CLI overrides.
    ///
    /// Reads `SITELENS_API_KEY` (falling back to `OPENAI_API_KEY`) and
    /// `SITELENS_BASE_URL`. The model override, if any, comes from the CLI.
    pub fn from_env(model_override: Option<&str>) -> Result<Self> {
        let api_key = std::env::var("SITELENS_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .unwrap_or_default();

        let base_url = std::env::var("SITELENS_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let model = model_override
            .unwrap_or(DEFAULT_EMBEDDING_MODEL)
            .to_string();

        Self::new(api_key, base_url, model, DEFAULT_MAX_INPUT_TOKENS)
    }

    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        max_input_tokens: usize,
    ) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(Error::Config("embedding model name is empty".into()));
        }
        let dimension = model_dimension(&model).ok_or_else(|| {
            Error::Config(format!("unknown embedding model: {model}"))
        })?;
        if max_input_tokens == 0 {
            return Err(Error::Config(
                "max input tokens must be at least 1".into(),
            ));
        }
        if base_url.trim().is_empty() {
            return Err(Error::Config("embedding API base URL is empty".into()));
        }

        Ok(Self {
            api_key,
            base_url,
            model,
            dimension,
            max_input_tokens,
            timeout: DEFAULT_HTTP_TIMEOUT,
        })
    }
}
