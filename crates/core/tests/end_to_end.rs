use nugget_retrieval_core::{
    build_index, index::squared_l2, load_snapshot, retrieve, save_snapshot,
    CharacterNgramEmbedder, Embedder, RetrievalError, Retriever,
};
use std::collections::HashSet;
use tempfile::tempdir;

fn documents() -> Vec<String> {
    vec![
        "Name: A\nType: Cafe\n".to_string(),
        "Name: B\nType: Diner\n".to_string(),
        "Name: C\nType: Cafe\n".to_string(),
    ]
}

#[test]
fn cafe_query_returns_two_distinct_corpus_documents() -> Result<(), Box<dyn std::error::Error>> {
    let embedder = CharacterNgramEmbedder::default();
    let (corpus, index) = build_index(documents(), &embedder)?;

    let results = retrieve("Cafe near me", &corpus, &index, &embedder, 2)?;

    assert_eq!(results.len(), 2);
    let unique: HashSet<&String> = results.iter().collect();
    assert_eq!(unique.len(), 2);
    assert!(results.iter().all(|text| documents().contains(text)));

    let query = embedder.embed("Cafe near me")?;
    let distances: Vec<f32> = results
        .iter()
        .map(|text| embedder.embed(text).map(|vector| squared_l2(&query, &vector)))
        .collect::<Result<_, _>>()?;
    assert!(distances[0] <= distances[1]);
    Ok(())
}

#[test]
fn snapshot_serves_the_same_answers_after_reload() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("knowledge_base").join("snapshot.json");
    let embedder = CharacterNgramEmbedder::default();

    let (corpus, index) = build_index(documents(), &embedder)?;
    let before = retrieve("diner", &corpus, &index, &embedder, 3)?;
    save_snapshot(&corpus, &index, embedder.model(), &path)?;

    let (corpus, index) = load_snapshot(&path)?;
    let retriever = Retriever::new(corpus, index, embedder)?;
    assert_eq!(retriever.retrieve("diner", 3)?, before);
    assert_eq!(before[0], "Name: B\nType: Diner\n");
    Ok(())
}

#[test]
fn empty_snapshot_refuses_retrieval() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("snapshot.json");
    let embedder = CharacterNgramEmbedder::default();

    let (corpus, index) = build_index(Vec::new(), &embedder)?;
    save_snapshot(&corpus, &index, embedder.model(), &path)?;
    let (corpus, index) = load_snapshot(&path)?;

    let result = retrieve("cafe", &corpus, &index, &embedder, 3);
    assert!(matches!(result, Err(RetrievalError::EmptyCorpus)));
    Ok(())
}
