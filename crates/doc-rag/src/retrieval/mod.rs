//! Retrieval over stored chunks

pub mod search;

pub use search::{cosine_similarity, RetrievalEngine, LEXICAL_FALLBACK_SCORE};
