//! Agent Tools
//!
//! Tools that implement `agent_core::Tool`.

mod wikipedia;

pub use wikipedia::{MAX_SUMMARY_CHARS, NO_RESULT, WikipediaTool};
