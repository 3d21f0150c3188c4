use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("corpus position {position} is out of range for {len} documents")]
    IndexOutOfRange { position: usize, len: usize },

    #[error("snapshot is corrupt: {0}")]
    SnapshotCorrupt(String),

    #[error("the index holds no documents; rebuild the snapshot before searching")]
    EmptyCorpus,

    #[error("corpus has {documents} documents but the index holds {vectors} vectors")]
    CorpusMisaligned { documents: usize, vectors: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid selector `{selector}`: {details}")]
    InvalidSelector { selector: String, details: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("generator api key is not configured")]
    MissingApiKey,
}

pub type Result<T, E = RetrievalError> = std::result::Result<T, E>;
