//! Overlapping character-window chunker.
//!
//! Chunks are produced once at ingestion and are immutable afterwards;
//! each one remembers its source file and position so retrieval results
//! can cite where a passage came from.

use serde::{Deserialize, Serialize};

/// One passage of an ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_file: String,
    pub chunk_index: usize,
}

/// Split `text` into overlapping character windows and attach source
/// metadata. Windows advance by `chunk_size - overlap` characters;
/// `overlap` must be smaller than `chunk_size`.
pub fn chunk_document(
    text: &str,
    source_file: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    debug_assert!(overlap < chunk_size);

    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                text: trimmed.to_owned(),
                source_file: source_file.to_owned(),
                chunk_index: chunks.len(),
            });
        }
        if end >= chars.len() {
            break;
        }
        start += chunk_size - overlap;
    }

    chunks
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_document("Hello world", "a.txt", 100, 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello world");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].source_file, "a.txt");
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_document("   \n  ", "a.txt", 100, 20).is_empty());
    }

    #[test]
    fn windows_overlap() {
        let text = "a".repeat(100);
        let chunks = chunk_document(&text, "a.txt", 40, 10);
        // Stride 30: starts at 0, 30, 60, 90.
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].text.len(), 40);
        assert_eq!(chunks[3].text.len(), 10);
    }

    #[test]
    fn chunk_indexes_are_sequential() {
        let text = "x".repeat(250);
        let chunks = chunk_document(&text, "a.txt", 100, 10);
        let indexes: Vec<_> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indexes, (0..chunks.len()).collect::<Vec<_>>());
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "知识库".repeat(60); // 180 chars, 540 bytes
        let chunks = chunk_document(&text, "kb.md", 100, 10);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].text.chars().count(), 100);
    }
}
