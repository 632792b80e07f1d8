//! Startup wiring: configuration loading and shared-state construction.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use mn_domain::config::Config;
use mn_domain::error::{Error, Result};
use mn_index::{Embedder, VectorIndex};
use mn_providers::{EmbeddingsRequest, ProviderRegistry};
use mn_store::Database;

use crate::state::AppState;

/// Load the TOML config from `path`, or fall back to defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        eprintln!(
            "config file {} not found -- using built-in defaults",
            path.display()
        );
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Build the shared application state: open the database, instantiate the
/// provider registry, and load the vector index with an embedder backed
/// by the registry's `embedder` role.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let db = Arc::new(
        Database::open(&config.knowledge.database_path).context("opening database")?,
    );

    let llm = Arc::new(
        ProviderRegistry::from_config(&config.llm).context("building provider registry")?,
    );

    let embedding_model = llm
        .model_for_role("embedder")
        .map(str::to_owned)
        .unwrap_or_else(|| config.knowledge.embedding_model.clone());
    let embedder: Arc<dyn Embedder> = Arc::new(RoleEmbedder {
        llm: llm.clone(),
        model: embedding_model,
    });

    let index = Arc::new(
        VectorIndex::load(&config.knowledge.vector_store_dir, embedder)
            .context("loading vector index")?,
    );

    Ok(AppState {
        config,
        llm,
        db,
        index,
    })
}

/// Bridges the index's [`Embedder`] seam to the provider registry.
/// The provider is resolved per call so that the index can be loaded
/// before any provider credentials are configured.
struct RoleEmbedder {
    llm: Arc<ProviderRegistry>,
    model: String,
}

#[async_trait::async_trait]
impl Embedder for RoleEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let provider = self
            .llm
            .for_role("embedder")
            .or_else(|| self.llm.iter().next().map(|(_, p)| p.clone()))
            .ok_or_else(|| {
                Error::Config(
                    "no provider available for the embedder role -- configure one under \
                     [llm.providers] and assign [llm.roles].embedder"
                        .into(),
                )
            })?;

        let resp = provider
            .embeddings(EmbeddingsRequest {
                input: texts.to_vec(),
                model: Some(self.model.clone()),
            })
            .await?;
        Ok(resp.embeddings)
    }
}
