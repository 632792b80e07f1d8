//! LLM provider adapters for mnema.
//!
//! Everything upstream of the agent loop goes through the [`LlmProvider`]
//! trait: streaming chat completions with tool calling, and text
//! embeddings for the knowledge index. The single shipped adapter speaks
//! the OpenAI wire contract, which covers the DeepSeek chat endpoint and
//! the SiliconFlow embedding endpoint alike.

pub mod openai_compat;
pub mod registry;
mod sse;
mod traits;
mod util;

pub use registry::ProviderRegistry;
pub use traits::{
    ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider,
};
