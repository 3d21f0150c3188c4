use crate::corpus::CorpusStore;
use crate::error::RetrievalError;
use crate::index::VectorIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Durable form of a built index: the ordered documents and the raw N×D
/// vector matrix. The search structure itself is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub snapshot_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub model: String,
    pub dimension: usize,
    pub corpus_checksum: String,
    pub documents: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
}

impl Snapshot {
    pub fn capture(
        corpus: &CorpusStore,
        index: &VectorIndex,
        model: &str,
    ) -> Result<Self, RetrievalError> {
        if corpus.len() != index.count() {
            return Err(RetrievalError::CorpusMisaligned {
                documents: corpus.len(),
                vectors: index.count(),
            });
        }

        let documents = corpus.documents().to_vec();
        let vectors: Vec<Vec<f32>> = index.rows().map(<[f32]>::to_vec).collect();
        Ok(Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            snapshot_id: Uuid::new_v4(),
            created_at: Utc::now(),
            model: model.to_string(),
            dimension: index.dimension(),
            corpus_checksum: corpus_checksum(index.dimension(), &documents, &vectors),
            vectors,
            documents,
        })
    }

    pub fn verify(&self) -> Result<(), RetrievalError> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(RetrievalError::SnapshotCorrupt(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }

        if self.vectors.len() != self.documents.len() {
            return Err(RetrievalError::SnapshotCorrupt(format!(
                "{} vector rows for {} documents",
                self.vectors.len(),
                self.documents.len()
            )));
        }

        if self.dimension == 0 {
            return Err(RetrievalError::SnapshotCorrupt(
                "declared dimension is zero".to_string(),
            ));
        }

        if let Some((row, vector)) = self
            .vectors
            .iter()
            .enumerate()
            .find(|(_, vector)| vector.len() != self.dimension)
        {
            return Err(RetrievalError::SnapshotCorrupt(format!(
                "row {} has dimension {}, expected {}",
                row,
                vector.len(),
                self.dimension
            )));
        }

        let actual = corpus_checksum(self.dimension, &self.documents, &self.vectors);
        if actual != self.corpus_checksum {
            return Err(RetrievalError::SnapshotCorrupt(format!(
                "corpus checksum {} does not match recorded {}",
                actual, self.corpus_checksum
            )));
        }

        Ok(())
    }

    pub fn into_parts(self) -> Result<(CorpusStore, VectorIndex), RetrievalError> {
        self.verify()?;
        let index = VectorIndex::build(self.dimension, &self.vectors)
            .map_err(|error| RetrievalError::SnapshotCorrupt(error.to_string()))?;
        Ok((CorpusStore::new(self.documents), index))
    }

    /// Writes to a sibling temporary file, then renames it over
    /// `destination` so readers never observe a partial snapshot.
    pub fn write(&self, destination: &Path) -> Result<(), RetrievalError> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let staging = staging_path(destination)?;
        let written = self
            .write_staging(&staging)
            .and_then(|()| fs::rename(&staging, destination).map_err(RetrievalError::from));

        if written.is_err() {
            let _ = fs::remove_file(&staging);
        }
        written
    }

    fn write_staging(&self, staging: &Path) -> Result<(), RetrievalError> {
        let file = File::create(staging)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    pub fn read(source: &Path) -> Result<Self, RetrievalError> {
        let file = File::open(source)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|error| {
            RetrievalError::SnapshotCorrupt(format!(
                "cannot decode {}: {}",
                source.display(),
                error
            ))
        })
    }
}

fn staging_path(destination: &Path) -> Result<PathBuf, RetrievalError> {
    let mut name = destination
        .file_name()
        .ok_or_else(|| {
            RetrievalError::InvalidArgument(format!(
                "snapshot path has no file name: {}",
                destination.display()
            ))
        })?
        .to_os_string();
    name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    Ok(destination.with_file_name(name))
}

/// SHA-256 over the dimension, every document and every vector value.
/// JSON round-trips `f32` exactly, so a reloaded matrix hashes the same.
fn corpus_checksum(dimension: usize, documents: &[String], vectors: &[Vec<f32>]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((dimension as u64).to_le_bytes());
    hasher.update((documents.len() as u64).to_le_bytes());
    for document in documents {
        hasher.update((document.len() as u64).to_le_bytes());
        hasher.update(document.as_bytes());
    }
    for row in vectors {
        for value in row {
            hasher.update(value.to_le_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}
