//! File-backed vector index with cosine similarity search.
//!
//! Entries live in memory behind a read-write lock and persist to a single
//! `index.json` under the configured directory; the file is rewritten after
//! every `add`. Embeddings come from an [`Embedder`], resolved at startup
//! from the provider registry's `embedder` role.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use mn_domain::error::{Error, Result};

use crate::chunker::Chunk;

/// Anything that can turn text into vectors.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// A search result, best-first.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub source_file: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    text: String,
    source_file: String,
    chunk_index: usize,
    embedding: Vec<f32>,
}

pub struct VectorIndex {
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<IndexEntry>>,
}

impl VectorIndex {
    /// Load the index from `dir/index.json`, or start empty if the file
    /// does not exist yet.
    pub fn load(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(Error::Io)?;
        let path = dir.join("index.json");

        let entries: Vec<IndexEntry> = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "index file unreadable, starting empty");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        tracing::info!(entries = entries.len(), path = %path.display(), "vector index loaded");

        Ok(Self {
            path,
            embedder,
            entries: RwLock::new(entries),
        })
    }

    /// Embed and append chunks, then persist. Returns how many entries
    /// were added.
    pub async fn add(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Index(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        {
            let mut entries = self.entries.write();
            for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
                entries.push(IndexEntry {
                    text: chunk.text,
                    source_file: chunk.source_file,
                    chunk_index: chunk.chunk_index,
                    embedding,
                });
            }
        }

        let added = texts.len();
        self.save()?;
        tracing::debug!(added, total = self.count(), "index entries added");
        Ok(added)
    }

    /// Top-`k` entries by cosine similarity to the query, best-first.
    /// An empty index yields an empty result, not an error.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.count() == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let query_vecs = self.embedder.embed(&[query.to_owned()]).await?;
        let query_vec = query_vecs
            .first()
            .ok_or_else(|| Error::Index("embedder returned no vector for query".into()))?;

        let entries = self.entries.read();
        let mut scored: Vec<(f32, &IndexEntry)> = entries
            .iter()
            .map(|e| (cosine_similarity(query_vec, &e.embedding), e))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, e)| SearchHit {
                text: e.text.clone(),
                source_file: e.source_file.clone(),
                score,
            })
            .collect())
    }

    /// Number of indexed chunks.
    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    fn save(&self) -> Result<()> {
        let entries = self.entries.read();
        let json = serde_json::to_string(&*entries)?;
        std::fs::write(&self.path, json).map_err(Error::Io)
    }
}

/// Cosine similarity; 0.0 for mismatched or zero-magnitude vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.5, 0.7];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_zero_and_mismatched_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
