//! Chunk ranking: cosine similarity over stored embeddings, with lexical fallback

use std::sync::Arc;

use crate::error::Result;
use crate::providers::EmbeddingProvider;
use crate::storage::{CandidateChunk, DocumentDb, StoredEmbedding};
use crate::types::{RetrievalMode, SearchFilters, SearchResult};

/// Score given to every lexical match
pub const LEXICAL_FALLBACK_SCORE: f32 = 0.5;

/// Cosine similarity in [-1, 1]; 0 when either vector has zero norm or the lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0) as f32
}

/// Ranks stored chunks against a query
pub struct RetrievalEngine {
    db: DocumentDb,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl RetrievalEngine {
    pub fn new(db: DocumentDb, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { db, embedder }
    }

    /// Whether semantic ranking is possible at all
    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Search for the `top_k` best chunks matching `query`
    ///
    /// Semantic mode is used when an embedder is configured and at least one
    /// candidate carries an embedding; otherwise chunks containing the query
    /// (case-insensitive) are returned in insertion order with a fixed score.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        // whitespace only counts as empty; matching uses the query as given
        if query.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let scan_filters = filters.clone();
        let candidates = self
            .db
            .blocking(move |db| db.candidate_chunks(&scan_filters))
            .await?;

        let has_vectors = candidates
            .iter()
            .any(|c| matches!(c.embedding, StoredEmbedding::Vector(_)));

        if let (Some(embedder), true) = (&self.embedder, has_vectors) {
            match embedder.embed(query).await {
                Ok(query_vector) if is_usable(&query_vector) => {
                    return Ok(rank_semantic(candidates, &query_vector, top_k));
                }
                Ok(_) => {
                    tracing::warn!("Query embedding was empty or non-finite, using lexical fallback");
                }
                Err(e) => {
                    tracing::warn!("Query embedding failed ({}), using lexical fallback", e);
                }
            }
        }

        Ok(rank_lexical(candidates, query, top_k))
    }
}

fn is_usable(vector: &[f32]) -> bool {
    !vector.is_empty() && vector.iter().all(|x| x.is_finite())
}

fn to_result(candidate: CandidateChunk, score: f32, mode: RetrievalMode) -> SearchResult {
    SearchResult {
        document_id: candidate.document_id,
        title: candidate.title,
        chunk_id: candidate.chunk_id,
        chunk_index: candidate.chunk_index,
        chunk_content: candidate.content,
        page_number: candidate.page_number,
        score,
        mode,
    }
}

fn rank_semantic(candidates: Vec<CandidateChunk>, query: &[f32], top_k: usize) -> Vec<SearchResult> {
    let total = candidates.len();
    let mut scored: Vec<(CandidateChunk, f32)> = candidates
        .into_iter()
        .filter_map(|mut c| match std::mem::replace(&mut c.embedding, StoredEmbedding::Absent) {
            StoredEmbedding::Vector(v) if v.len() == query.len() => {
                let score = cosine_similarity(query, &v);
                Some((c, score))
            }
            _ => None,
        })
        .collect();

    if scored.len() < total {
        tracing::debug!(
            "Excluded {} of {} candidates without a usable embedding",
            total - scored.len(),
            total
        );
    }

    // stable: equal scores keep insertion order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(c, score)| to_result(c, score, RetrievalMode::Semantic))
        .collect()
}

fn rank_lexical(candidates: Vec<CandidateChunk>, query: &str, top_k: usize) -> Vec<SearchResult> {
    let needle = query.to_lowercase();
    candidates
        .into_iter()
        .filter(|c| c.content.to_lowercase().contains(&needle))
        .take(top_k)
        .map(|c| to_result(c, LEXICAL_FALLBACK_SCORE, RetrievalMode::Lexical))
        .collect()
}
