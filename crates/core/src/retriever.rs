use crate::corpus::CorpusStore;
use crate::embeddings::Embedder;
use crate::error::RetrievalError;
use crate::index::VectorIndex;
use crate::models::RetrievedDocument;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 3;

/// Returns the `k` documents nearest to `query`, nearest first.
///
/// An index with no vectors is an error rather than an empty answer; an
/// index with fewer than `k` vectors simply returns what it has.
pub fn retrieve<E>(
    query: &str,
    corpus: &CorpusStore,
    index: &VectorIndex,
    embedder: &E,
    k: usize,
) -> Result<Vec<String>, RetrievalError>
where
    E: Embedder + ?Sized,
{
    Ok(retrieve_scored(query, corpus, index, embedder, k)?
        .into_iter()
        .map(|hit| hit.text)
        .collect())
}

pub fn retrieve_scored<E>(
    query: &str,
    corpus: &CorpusStore,
    index: &VectorIndex,
    embedder: &E,
    k: usize,
) -> Result<Vec<RetrievedDocument>, RetrievalError>
where
    E: Embedder + ?Sized,
{
    if k == 0 {
        return Err(RetrievalError::InvalidArgument(
            "k must be at least 1".to_string(),
        ));
    }

    if index.count() == 0 {
        return Err(RetrievalError::EmptyCorpus);
    }

    let query_vector = embedder.embed(query)?;
    let hits = index.search(&query_vector, k)?;
    debug!(k, hits = hits.len(), "nearest neighbors found");

    hits.into_iter()
        .map(|hit| {
            Ok(RetrievedDocument {
                position: hit.position,
                distance: hit.distance,
                text: corpus.get(hit.position)?.to_string(),
            })
        })
        .collect()
}

/// Owns a loaded corpus, its index, and the embedder used for queries.
pub struct Retriever<E> {
    corpus: CorpusStore,
    index: VectorIndex,
    embedder: E,
}

impl<E: Embedder> Retriever<E> {
    pub fn new(corpus: CorpusStore, index: VectorIndex, embedder: E) -> Result<Self, RetrievalError> {
        if corpus.len() != index.count() {
            return Err(RetrievalError::CorpusMisaligned {
                documents: corpus.len(),
                vectors: index.count(),
            });
        }

        if embedder.dimensions() != index.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: index.dimension(),
                found: embedder.dimensions(),
            });
        }

        Ok(Self {
            corpus,
            index,
            embedder,
        })
    }

    pub fn corpus(&self) -> &CorpusStore {
        &self.corpus
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        retrieve(query, &self.corpus, &self.index, &self.embedder, k)
    }

    pub fn retrieve_scored(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        retrieve_scored(query, &self.corpus, &self.index, &self.embedder, k)
    }
}

#[cfg(test)]
mod tests {
    use super::{retrieve, Retriever, DEFAULT_TOP_K};
    use crate::builder::build_index;
    use crate::corpus::CorpusStore;
    use crate::embeddings::{CharacterNgramEmbedder, Embedder};
    use crate::error::RetrievalError;
    use crate::index::VectorIndex;

    /// Maps text onto a line so distances are easy to reason about.
    struct LengthEmbedder;

    impl Embedder for LengthEmbedder {
        fn dimensions(&self) -> usize {
            1
        }

        fn model(&self) -> &str {
            "length"
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
            Ok(vec![text.chars().count() as f32])
        }
    }

    fn corpus() -> Vec<String> {
        vec!["aaaa".to_string(), "a".to_string(), "aaaaaaaa".to_string(), "aa".to_string()]
    }

    #[test]
    fn retrieve_returns_nearest_documents_first() {
        let (corpus, index) = build_index(corpus(), &LengthEmbedder).unwrap();
        let documents = retrieve("xx", &corpus, &index, &LengthEmbedder, DEFAULT_TOP_K).unwrap();
        assert_eq!(documents, vec!["aa", "a", "aaaa"]);
    }

    #[test]
    fn retrieve_caps_results_at_corpus_size() {
        let (corpus, index) = build_index(corpus(), &LengthEmbedder).unwrap();
        let documents = retrieve("xx", &corpus, &index, &LengthEmbedder, 10).unwrap();
        assert_eq!(documents.len(), 4);
    }

    #[test]
    fn empty_index_is_an_error() {
        let corpus = CorpusStore::default();
        let index = VectorIndex::new(1).unwrap();
        let result = retrieve("anything", &corpus, &index, &LengthEmbedder, 3);
        assert!(matches!(result, Err(RetrievalError::EmptyCorpus)));
    }

    #[test]
    fn zero_k_is_rejected() {
        let (corpus, index) = build_index(corpus(), &LengthEmbedder).unwrap();
        let result = retrieve("xx", &corpus, &index, &LengthEmbedder, 0);
        assert!(matches!(result, Err(RetrievalError::InvalidArgument(_))));
    }

    #[test]
    fn query_embedder_with_other_dimension_fails() {
        let (corpus, index) = build_index(corpus(), &LengthEmbedder).unwrap();
        let other = CharacterNgramEmbedder { dimensions: 8 };
        let result = retrieve("xx", &corpus, &index, &other, 2);
        assert!(matches!(
            result,
            Err(RetrievalError::DimensionMismatch { expected: 1, found: 8 })
        ));
    }

    #[test]
    fn short_corpus_surfaces_out_of_range() {
        let index = VectorIndex::build(1, &[vec![1.0], vec![2.0]]).unwrap();
        let corpus = CorpusStore::new(vec!["a".to_string()]);
        let result = retrieve("aa", &corpus, &index, &LengthEmbedder, 1);
        assert!(matches!(
            result,
            Err(RetrievalError::IndexOutOfRange { position: 1, len: 1 })
        ));
    }

    #[test]
    fn retriever_checks_alignment_on_construction() {
        let index = VectorIndex::build(1, &[vec![1.0]]).unwrap();
        let result = Retriever::new(CorpusStore::default(), index, LengthEmbedder);
        assert!(matches!(
            result,
            Err(RetrievalError::CorpusMisaligned { documents: 0, vectors: 1 })
        ));
    }

    #[test]
    fn retriever_reports_scores() {
        let (corpus, index) = build_index(corpus(), &LengthEmbedder).unwrap();
        let retriever = Retriever::new(corpus, index, LengthEmbedder).unwrap();

        let scored = retriever.retrieve_scored("xxx", 2).unwrap();
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].position, 0);
        assert_eq!(scored[0].distance, 1.0);
        assert_eq!(scored[1].position, 3);
        assert_eq!(retriever.retrieve("xxx", 2).unwrap(), vec!["aaaa", "aa"]);
    }

    #[test]
    fn retriever_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CorpusStore>();
        assert_send_sync::<VectorIndex>();
        assert_send_sync::<Retriever<CharacterNgramEmbedder>>();
        assert_send_sync::<Retriever<Box<dyn Embedder + Send + Sync>>>();

        let embedder = CharacterNgramEmbedder { dimensions: 16 };
        let (corpus, index) = build_index(corpus(), &embedder).unwrap();
        let retriever = std::sync::Arc::new(Retriever::new(corpus, index, embedder).unwrap());
        let expected = retriever.retrieve("aaa", 2).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let retriever = std::sync::Arc::clone(&retriever);
                std::thread::spawn(move || retriever.retrieve("aaa", 2).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}
