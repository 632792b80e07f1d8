use std::sync::Arc;

use mn_domain::config::Config;
use mn_index::VectorIndex;
use mn_providers::ProviderRegistry;
use mn_store::Database;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// LLM providers (`executor` role answers turns, `embedder` role
    /// vectorizes documents).
    pub llm: Arc<ProviderRegistry>,
    /// Conversations, messages, and document records.
    pub db: Arc<Database>,
    /// The knowledge-base vector index.
    pub index: Arc<VectorIndex>,
}
