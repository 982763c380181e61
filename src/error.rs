pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{operation} exceeded the {limit_ms}ms operation timeout")]
    Timeout {
        operation: &'static str,
        limit_ms: u64,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited by the embedding API: {0}")]
    RateLimited(String),

    #[error("network error talking to the embedding API: {0}")]
    Network(String),

    #[error("input too large for the embedding model: {0}")]
    InputTooLarge(String),

    #[error("schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("embedding document {doc_id} failed: {source}")]
    Sync {
        doc_id: u64,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Stable machine-readable token for the error kind.
    ///
    /// Callers surface this alongside the human-readable message so that
    /// scripted consumers can distinguish, say, a rate limit (back off and
    /// retry later) from an auth failure (do not retry).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::RedbStorage(_)
            | Error::RedbTransaction(_)
            | Error::RedbTable(_)
            | Error::RedbCommit(_) => "store",
            Error::Json(_) => "json",
            Error::Config(_) => "config",
            Error::StoreUnavailable(_) => "store_unavailable",
            Error::Timeout { .. } => "timeout",
            Error::Auth(_) => "auth",
            Error::RateLimited(_) => "rate_limited",
            Error::Network(_) => "network",
            Error::InputTooLarge(_) => "input_too_large",
            Error::SchemaMismatch { .. } => "schema_mismatch",
            Error::InvalidInput(_) => "invalid_input",
            Error::Sync { .. } => "sync",
        }
    }

    /// Whether retrying the same call unchanged is reasonable.
    ///
    /// Transient network failures are retryable; rate limits only after
    /// backing off; everything else needs caller intervention first.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout { .. })
    }
}
