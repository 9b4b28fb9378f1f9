//! Vector index: build, persist, load, and scan document embeddings.
//!
//! The index is a rebuildable cache over the corpus, persisted as a
//! directory pair:
//! - `vectors.bin` — all embedding vectors, little-endian f32, row-major
//! - `docstore.json` — the embedding model identity plus per-entry content
//!   and metadata
//!
//! An index is only valid for queries embedded with the same model that
//! built it, so the docstore records the model identifier and [`VectorIndex::load`]
//! refuses an embedder whose identity differs. Rebuilds are always full:
//! correctness against stale or mixed embeddings is easier to guarantee
//! than incremental upsert at this corpus scale, and a rebuild happens once
//! per new distinct query, not per search.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::error::{Result, RetrievalError};
use crate::models::{ColumnTable, COL_CONTENT};

const VECTORS_FILE: &str = "vectors.bin";
const DOCSTORE_FILE: &str = "docstore.json";

/// One indexed document: its embedded content plus every other column as
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocEntry {
    pub content: String,
    pub metadata: BTreeMap<String, String>,
    /// SHA-256 of `content`, checked on load against the stored text.
    pub content_sha256: String,
}

#[derive(Serialize, Deserialize)]
struct DocStore {
    model: String,
    dims: usize,
    entries: Vec<DocEntry>,
}

/// An in-memory similarity index over document embeddings.
#[derive(Debug)]
pub struct VectorIndex {
    model: String,
    dims: usize,
    vectors: Vec<Vec<f32>>,
    entries: Vec<DocEntry>,
}

impl VectorIndex {
    /// Embed every `content` cell of a column-oriented table.
    ///
    /// Fails with a `Schema` error if the `content` column is missing or if
    /// any column's length differs from the others (all columns must align
    /// row-for-row). Every non-content column becomes per-entry metadata.
    pub async fn build(table: &ColumnTable, embedder: &dyn Embedder) -> Result<Self> {
        let contents = table.get(COL_CONTENT).ok_or_else(|| {
            RetrievalError::Schema(format!(
                "column '{}' not found in the table to index",
                COL_CONTENT
            ))
        })?;

        for (column, values) in table {
            if values.len() != contents.len() {
                return Err(RetrievalError::Schema(format!(
                    "column '{}' has {} values, expected {}",
                    column,
                    values.len(),
                    contents.len()
                )));
            }
        }

        let mut entries = Vec::with_capacity(contents.len());
        for i in 0..contents.len() {
            let mut metadata = BTreeMap::new();
            for (column, values) in table {
                if column != COL_CONTENT {
                    metadata.insert(column.clone(), values[i].clone());
                }
            }
            entries.push(DocEntry {
                content: contents[i].clone(),
                metadata,
                content_sha256: sha256_hex(&contents[i]),
            });
        }

        let vectors = embedder.embed_batch(contents).await?;
        for vec in &vectors {
            if vec.len() != embedder.dims() {
                return Err(RetrievalError::Parse(format!(
                    "embedding endpoint returned {} dims, expected {}",
                    vec.len(),
                    embedder.dims()
                )));
            }
        }

        Ok(Self {
            model: embedder.model_name().to_string(),
            dims: embedder.dims(),
            vectors,
            entries,
        })
    }

    /// Persist the index pair under `dir`, overwriting a prior index.
    ///
    /// Both files are written via temp-then-rename so a crash mid-save
    /// leaves the previous index loadable.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let docstore_path = dir.join(DOCSTORE_FILE);
        if docstore_path.exists() {
            warn!(path = %dir.display(), "replacing existing vector index");
        }

        let mut blob = Vec::with_capacity(self.vectors.len() * self.dims * 4);
        for vec in &self.vectors {
            blob.extend_from_slice(&vec_to_blob(vec));
        }
        let vectors_tmp = dir.join(format!("{}.tmp", VECTORS_FILE));
        std::fs::write(&vectors_tmp, &blob)?;
        std::fs::rename(&vectors_tmp, dir.join(VECTORS_FILE))?;

        let docstore = DocStore {
            model: self.model.clone(),
            dims: self.dims,
            entries: self.entries.clone(),
        };
        let docstore_tmp = dir.join(format!("{}.tmp", DOCSTORE_FILE));
        std::fs::write(&docstore_tmp, serde_json::to_vec_pretty(&docstore)?)?;
        std::fs::rename(&docstore_tmp, docstore_path)?;

        Ok(())
    }

    /// Load a persisted index from `dir`, verifying the embedder identity.
    ///
    /// Fails with `NotFound` if the pair is absent, `EmbedderMismatch` if
    /// the index was built with a different model than `embedder`, and a
    /// `Schema` error if the stored files disagree with each other.
    pub fn load(dir: &Path, embedder: &dyn Embedder) -> Result<Self> {
        let docstore_path = dir.join(DOCSTORE_FILE);
        let vectors_path = dir.join(VECTORS_FILE);
        if !docstore_path.exists() || !vectors_path.exists() {
            return Err(RetrievalError::NotFound(dir.to_path_buf()));
        }

        let docstore: DocStore = serde_json::from_slice(&std::fs::read(&docstore_path)?)?;

        if docstore.model != embedder.model_name() {
            return Err(RetrievalError::EmbedderMismatch {
                expected: docstore.model,
                actual: embedder.model_name().to_string(),
            });
        }

        let blob = std::fs::read(&vectors_path)?;
        let expected_len = docstore.entries.len() * docstore.dims * 4;
        if blob.len() != expected_len {
            return Err(RetrievalError::Schema(format!(
                "vectors file holds {} bytes, docstore expects {}",
                blob.len(),
                expected_len
            )));
        }

        for entry in &docstore.entries {
            if sha256_hex(&entry.content) != entry.content_sha256 {
                return Err(RetrievalError::Schema(
                    "docstore content does not match its recorded fingerprint".into(),
                ));
            }
        }

        let vectors = blob
            .chunks_exact(docstore.dims * 4)
            .map(blob_to_vec)
            .collect();

        Ok(Self {
            model: docstore.model,
            dims: docstore.dims,
            vectors,
            entries: docstore.entries,
        })
    }

    /// Nearest entries to `query_vec` by cosine similarity.
    ///
    /// `filter` keeps only entries whose metadata contains every given
    /// key-value pair. Returns at most `limit` `(entry index, score)`
    /// pairs, descending score, ties in entry order (stable sort).
    pub fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: &BTreeMap<String, String>,
    ) -> Vec<(usize, f64)> {
        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                filter
                    .iter()
                    .all(|(k, v)| entry.metadata.get(k).map(String::as_str) == Some(v.as_str()))
            })
            .map(|(i, _)| (i, cosine_similarity(query_vec, &self.vectors[i]) as f64))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    pub fn entry(&self, index: usize) -> &DocEntry {
        &self.entries[index]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
