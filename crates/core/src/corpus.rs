use crate::error::RetrievalError;

/// Ordered documents, positionally aligned with the vectors of a
/// [`VectorIndex`](crate::VectorIndex).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusStore {
    documents: Vec<String>,
}

impl CorpusStore {
    pub fn new(documents: Vec<String>) -> Self {
        Self { documents }
    }

    pub fn get(&self, position: usize) -> Result<&str, RetrievalError> {
        self.documents
            .get(position)
            .map(String::as_str)
            .ok_or(RetrievalError::IndexOutOfRange {
                position,
                len: self.documents.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.documents.iter().map(String::as_str)
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }
}

impl From<Vec<String>> for CorpusStore {
    fn from(documents: Vec<String>) -> Self {
        Self::new(documents)
    }
}
