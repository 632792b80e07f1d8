//! Vector index integration tests with a deterministic embedder.

use std::collections::HashMap;
use std::sync::Arc;

use mn_domain::error::Result;
use mn_index::{chunk_document, Chunk, Embedder, VectorIndex};

/// Maps exact texts to fixed vectors; unknown texts embed to a far-away
/// direction so they never outrank an explicit mapping.
struct FixtureEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

impl FixtureEmbedder {
    fn new(pairs: &[(&str, [f32; 3])]) -> Arc<Self> {
        Arc::new(Self {
            vectors: pairs
                .iter()
                .map(|(text, v)| (text.to_string(), v.to_vec()))
                .collect(),
        })
    }
}

#[async_trait::async_trait]
impl Embedder for FixtureEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0, 0.0, 1.0])
            })
            .collect())
    }
}

fn chunk(text: &str, source: &str, idx: usize) -> Chunk {
    Chunk {
        text: text.into(),
        source_file: source.into(),
        chunk_index: idx,
    }
}

#[tokio::test]
async fn search_ranks_by_cosine_similarity() {
    let embedder = FixtureEmbedder::new(&[
        ("deadline info", [1.0, 0.0, 0.0]),
        ("grading policy", [0.0, 1.0, 0.0]),
        ("when is the deadline", [0.9, 0.1, 0.0]),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::load(dir.path(), embedder).unwrap();

    index
        .add(vec![
            chunk("deadline info", "syllabus.pdf", 0),
            chunk("grading policy", "syllabus.pdf", 1),
        ])
        .await
        .unwrap();

    let hits = index.search("when is the deadline", 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].text, "deadline info");
    assert_eq!(hits[0].source_file, "syllabus.pdf");
    assert!(hits[0].score > hits[1].score);
}

#[tokio::test]
async fn search_empty_index_returns_no_hits() {
    let embedder = FixtureEmbedder::new(&[]);
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::load(dir.path(), embedder).unwrap();
    let hits = index.search("anything", 5).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn k_caps_the_result_count() {
    let embedder = FixtureEmbedder::new(&[
        ("a", [1.0, 0.0, 0.0]),
        ("b", [0.8, 0.2, 0.0]),
        ("c", [0.5, 0.5, 0.0]),
        ("q", [1.0, 0.0, 0.0]),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::load(dir.path(), embedder).unwrap();
    index
        .add(vec![
            chunk("a", "f", 0),
            chunk("b", "f", 1),
            chunk("c", "f", 2),
        ])
        .await
        .unwrap();

    let hits = index.search("q", 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].text, "a");
}

#[tokio::test]
async fn index_persists_across_reload() {
    let embedder = FixtureEmbedder::new(&[("persisted text", [0.0, 1.0, 0.0])]);
    let dir = tempfile::tempdir().unwrap();

    {
        let index = VectorIndex::load(dir.path(), embedder.clone()).unwrap();
        index
            .add(vec![chunk("persisted text", "notes.txt", 0)])
            .await
            .unwrap();
        assert_eq!(index.count(), 1);
    }

    let reloaded = VectorIndex::load(dir.path(), embedder).unwrap();
    assert_eq!(reloaded.count(), 1);
    let hits = reloaded.search("persisted text", 1).await.unwrap();
    assert_eq!(hits[0].source_file, "notes.txt");
}

#[tokio::test]
async fn chunker_feeds_index_with_source_metadata() {
    let text = "alpha ".repeat(40); // ~240 chars
    let chunks = chunk_document(&text, "doc.md", 100, 10);
    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.source_file == "doc.md"));

    let embedder = FixtureEmbedder::new(&[]);
    let dir = tempfile::tempdir().unwrap();
    let index = VectorIndex::load(dir.path(), embedder).unwrap();
    let added = index.add(chunks.clone()).await.unwrap();
    assert_eq!(added, chunks.len());
    assert_eq!(index.count(), chunks.len());
}
