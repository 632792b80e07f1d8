//! The streaming retrieval-augmented conversation runtime.
//!
//! [`run_turn`] drives one model+tools interaction loop and re-emits a
//! normalized event stream; [`retrieval`] wraps the vector index behind
//! the one tool the model can call; [`context`] assembles the bounded
//! message history.

pub mod context;
pub mod retrieval;
pub mod turn;

pub use turn::{run_turn, TurnEvent, TurnInput};
