use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Bounded context window: how many recent messages are replayed to
    /// the model. Older context is silently dropped.
    #[serde(default = "d_history_limit")]
    pub history_limit: usize,
    /// How many passages one retrieval call pulls from the index.
    #[serde(default = "d_top_k")]
    pub retrieval_top_k: usize,
    /// Hard cap on model→tool round trips within a single turn.
    #[serde(default = "d_max_tool_loops")]
    pub max_tool_loops: usize,
    /// Sampling temperature passed to the executor model.
    #[serde(default = "d_temperature")]
    pub temperature: f32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: d_history_limit(),
            retrieval_top_k: d_top_k(),
            max_tool_loops: d_max_tool_loops(),
            temperature: d_temperature(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_history_limit() -> usize {
    10
}
fn d_top_k() -> usize {
    3
}
fn d_max_tool_loops() -> usize {
    8
}
fn d_temperature() -> f32 {
    0.7
}
