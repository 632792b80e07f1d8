//! Knowledge index for mnema: document text extraction, chunking, and a
//! file-backed vector index with cosine similarity search.

pub mod chunker;
pub mod extract;
pub mod vector;

pub use chunker::{chunk_document, Chunk};
pub use extract::{is_supported_extension, parse_file, ExtractedDocument};
pub use vector::{Embedder, SearchHit, VectorIndex};
