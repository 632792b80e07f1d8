//! mnema gateway -- the HTTP server hosting the streaming knowledge-base
//! QA pipeline plus the conversation and document management surface.

pub mod api;
pub mod bootstrap;
pub mod runtime;
pub mod state;
