//! Utilities offered to agents through the context pool

mod keyword_rag;

pub use keyword_rag::KeywordRag;
