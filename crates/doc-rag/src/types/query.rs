//! Search request types

use serde::{Deserialize, Serialize};

/// Filters applied to candidate chunks before scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Restrict to documents in this category
    #[serde(default)]
    pub category: Option<String>,
    /// Exclude soft-deleted documents (default: true)
    #[serde(default = "default_active_only")]
    pub active_only: bool,
}

fn default_active_only() -> bool {
    true
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            category: None,
            active_only: true,
        }
    }
}

impl SearchFilters {
    /// Filter by category; blank categories mean no filter
    pub fn with_category(category: Option<String>) -> Self {
        Self {
            category: category.filter(|c| !c.trim().is_empty()),
            ..Default::default()
        }
    }
}

/// Query-string form of `GET /api/search`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The search text
    #[serde(default)]
    pub q: String,
    /// Optional category filter
    #[serde(default)]
    pub category: Option<String>,
    /// Maximum results (server default when absent)
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchRequest {
    /// Create a request for the given query
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Default::default()
        }
    }

    /// Resolve the effective limit against server defaults
    pub fn effective_limit(&self, default_limit: usize, max_limit: usize) -> usize {
        self.limit.unwrap_or(default_limit).min(max_limit)
    }

    pub fn filters(&self) -> SearchFilters {
        SearchFilters::with_category(self.category.clone())
    }
}
