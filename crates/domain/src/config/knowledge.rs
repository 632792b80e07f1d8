use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Knowledge base / ingestion
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// SQLite database path.
    #[serde(default = "d_database_path")]
    pub database_path: PathBuf,
    /// Where uploaded document files are kept.
    #[serde(default = "d_documents_dir")]
    pub documents_dir: PathBuf,
    /// Where the vector index persists itself.
    #[serde(default = "d_vector_store_dir")]
    pub vector_store_dir: PathBuf,
    /// Chunk window in characters.
    #[serde(default = "d_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    #[serde(default = "d_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Embedding model name requested from the `embedder` provider role.
    #[serde(default = "d_embedding_model")]
    pub embedding_model: String,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            database_path: d_database_path(),
            documents_dir: d_documents_dir(),
            vector_store_dir: d_vector_store_dir(),
            chunk_size: d_chunk_size(),
            chunk_overlap: d_chunk_overlap(),
            embedding_model: d_embedding_model(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_database_path() -> PathBuf {
    "data/knowledge_qa.db".into()
}
fn d_documents_dir() -> PathBuf {
    "data/documents".into()
}
fn d_vector_store_dir() -> PathBuf {
    "data/vector_store".into()
}
fn d_chunk_size() -> usize {
    500
}
fn d_chunk_overlap() -> usize {
    50
}
fn d_embedding_model() -> String {
    "BAAI/bge-m3".into()
}
