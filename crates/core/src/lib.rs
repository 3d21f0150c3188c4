pub mod builder;
pub mod corpus;
pub mod embeddings;
pub mod error;
#[cfg(feature = "fastembed")]
pub mod fastembed_embedder;
pub mod generation;
pub mod index;
pub mod models;
pub mod retriever;
pub mod scrape;
pub mod session;
pub mod snapshot;
pub mod traits;

pub use builder::{build_index, load_snapshot, read_snapshot, save_snapshot};
pub use corpus::CorpusStore;
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, EmbeddingEndpointConfig, HttpEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
};
pub use error::{GenerationError, RetrievalError, ScrapeError};
#[cfg(feature = "fastembed")]
pub use fastembed_embedder::{FastEmbedEmbedder, FASTEMBED_DIMENSIONS, FASTEMBED_MODEL};
pub use generation::{
    build_prompt, GeminiConfig, GeminiGenerator, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL,
    NO_RESPONSE_PLACEHOLDER,
};
pub use index::{SearchHit, VectorIndex};
pub use models::{ConversationTurn, ExtractionRule, RetrievedDocument, ScrapeReport, SkippedPage};
pub use retriever::{retrieve, retrieve_scored, Retriever, DEFAULT_TOP_K};
pub use scrape::{default_rules, extract_document, load_rules, parse_rules, PageScraper};
pub use session::{SessionContext, HISTORY_WINDOW};
pub use snapshot::{Snapshot, SNAPSHOT_FORMAT_VERSION};
pub use traits::{DocumentSource, ResponseGenerator};
