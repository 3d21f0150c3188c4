use crate::{ConversationTurn, GenerationError, ScrapeReport};
use async_trait::async_trait;

/// Produces an answer grounded in retrieved documents.
#[async_trait]
pub trait ResponseGenerator {
    async fn generate(
        &self,
        documents: &[String],
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<String, GenerationError>;
}

/// Supplies the ordered documents an index is built from.
#[async_trait]
pub trait DocumentSource {
    async fn collect(&self, links: &[String]) -> ScrapeReport;
}
