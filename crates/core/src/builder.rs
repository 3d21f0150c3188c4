use crate::corpus::CorpusStore;
use crate::embeddings::Embedder;
use crate::error::RetrievalError;
use crate::index::VectorIndex;
use crate::snapshot::Snapshot;
use std::path::Path;
use tracing::{debug, info};

/// Embeds every document and returns the corpus and index aligned by
/// position.
pub fn build_index<E>(
    documents: Vec<String>,
    embedder: &E,
) -> Result<(CorpusStore, VectorIndex), RetrievalError>
where
    E: Embedder + ?Sized,
{
    debug!(documents = documents.len(), model = embedder.model(), "embedding corpus");
    let vectors = embedder.embed_many(&documents)?;

    if vectors.len() != documents.len() {
        return Err(RetrievalError::Embedding(format!(
            "embedder returned {} vectors for {} documents",
            vectors.len(),
            documents.len()
        )));
    }

    let index = VectorIndex::build(embedder.dimensions(), &vectors)?;
    let corpus = CorpusStore::new(documents);

    info!(
        documents = corpus.len(),
        dimension = index.dimension(),
        "index built"
    );

    Ok((corpus, index))
}

pub fn save_snapshot(
    corpus: &CorpusStore,
    index: &VectorIndex,
    model: &str,
    destination: &Path,
) -> Result<Snapshot, RetrievalError> {
    let snapshot = Snapshot::capture(corpus, index, model)?;
    snapshot.write(destination)?;

    info!(
        path = %destination.display(),
        snapshot_id = %snapshot.snapshot_id,
        documents = snapshot.documents.len(),
        "snapshot written"
    );

    Ok(snapshot)
}

/// Reads and verifies a snapshot without rebuilding the index.
pub fn read_snapshot(source: &Path) -> Result<Snapshot, RetrievalError> {
    let snapshot = Snapshot::read(source)?;
    snapshot.verify()?;
    Ok(snapshot)
}

pub fn load_snapshot(source: &Path) -> Result<(CorpusStore, VectorIndex), RetrievalError> {
    let snapshot = Snapshot::read(source)?;
    debug!(
        path = %source.display(),
        snapshot_id = %snapshot.snapshot_id,
        model = %snapshot.model,
        "loading snapshot"
    );
    snapshot.into_parts()
}

#[cfg(test)]
mod tests {
    use super::{build_index, load_snapshot, read_snapshot, save_snapshot};
    use crate::embeddings::{CharacterNgramEmbedder, Embedder};
    use crate::error::RetrievalError;
    use tempfile::tempdir;

    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        fn model(&self) -> &str {
            "short"
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
            Ok(vec![text.len() as f32; 3])
        }
    }

    fn documents() -> Vec<String> {
        vec![
            "Restaurant Name: Milan\nRestaurant Type: Thali\n".to_string(),
            "Restaurant Name: The Terrace\nRestaurant Type: Cafe\n".to_string(),
            "Restaurant Name: Dastarkhwan\nRestaurant Type: Mughlai\n".to_string(),
        ]
    }

    #[test]
    fn build_aligns_documents_with_vectors() {
        let embedder = CharacterNgramEmbedder::default();
        let (corpus, index) = build_index(documents(), &embedder).unwrap();

        assert_eq!(corpus.len(), 3);
        assert_eq!(index.count(), 3);
        for position in 0..3 {
            let expected = embedder.embed(corpus.get(position).unwrap()).unwrap();
            assert_eq!(index.vector(position), Some(expected.as_slice()));
        }
    }

    #[test]
    fn build_of_nothing_is_an_empty_index() {
        let (corpus, index) = build_index(Vec::new(), &CharacterNgramEmbedder::default()).unwrap();
        assert!(corpus.is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn embedder_dimension_disagreement_is_a_mismatch() {
        let result = build_index(documents(), &ShortEmbedder);
        assert!(matches!(
            result,
            Err(RetrievalError::DimensionMismatch { expected: 4, found: 3 })
        ));
    }

    #[test]
    fn save_then_load_round_trips() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("snapshot.json");
        let embedder = CharacterNgramEmbedder { dimensions: 64 };
        let (corpus, index) = build_index(documents(), &embedder)?;

        save_snapshot(&corpus, &index, embedder.model(), &path)?;
        let (loaded_corpus, loaded_index) = load_snapshot(&path)?;

        assert_eq!(loaded_corpus, corpus);
        assert_eq!(loaded_index.count(), index.count());
        assert_eq!(loaded_index.dimension(), index.dimension());

        for probe in ["cafe", "thali near charbagh", ""] {
            let query = embedder.embed(probe)?;
            let original = index.search(&query, 3)?;
            let restored = loaded_index.search(&query, 3)?;
            assert_eq!(original.len(), restored.len());
            for (left, right) in original.iter().zip(restored.iter()) {
                assert_eq!(left.position, right.position);
                assert!((left.distance - right.distance).abs() < 1e-5);
            }
        }

        let metadata = read_snapshot(&path)?;
        assert_eq!(metadata.model, "char-trigram-fnv1a");
        Ok(())
    }

    #[test]
    fn load_rejects_tampered_row_count() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("snapshot.json");
        let embedder = CharacterNgramEmbedder { dimensions: 8 };
        let (corpus, index) = build_index(documents(), &embedder)?;
        let mut snapshot = save_snapshot(&corpus, &index, embedder.model(), &path)?;

        snapshot.vectors.truncate(1);
        std::fs::write(&path, serde_json::to_vec(&snapshot)?)?;

        assert!(matches!(
            load_snapshot(&path),
            Err(RetrievalError::SnapshotCorrupt(_))
        ));
        Ok(())
    }

    #[test]
    fn saving_replaces_previous_snapshot() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("snapshot.json");
        let embedder = CharacterNgramEmbedder { dimensions: 8 };

        let (corpus, index) = build_index(documents(), &embedder)?;
        save_snapshot(&corpus, &index, embedder.model(), &path)?;

        let (smaller, smaller_index) = build_index(vec!["Name: Solo\n".to_string()], &embedder)?;
        save_snapshot(&smaller, &smaller_index, embedder.model(), &path)?;

        let (loaded, _) = load_snapshot(&path)?;
        assert_eq!(loaded.len(), 1);
        Ok(())
    }
}
