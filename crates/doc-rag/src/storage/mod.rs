//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for documents and chunks.

mod database;

pub use database::{CandidateChunk, DocumentDb, StoredEmbedding};
