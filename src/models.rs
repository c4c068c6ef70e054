//! Core data models used throughout the search service.
//!
//! These types represent the catalog items that flow into the index and the
//! rewritten query variants that flow into the merger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog item as supplied by the catalog loader or a reindex request.
///
/// Items are immutable per corpus snapshot: the index holds read-only copies
/// and a rebuild replaces them wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    #[serde(default)]
    pub seller_id: u64,
    #[serde(default)]
    pub category_id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub brand: String,
    /// Listing status code (e.g. active/paused); carried through untouched.
    #[serde(default)]
    pub status: i32,
    /// Marketplace relevance score; carried through untouched.
    #[serde(default)]
    pub score: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// A rewritten query: one primary string plus a small set of alternatives.
///
/// Produced by a [`QueryRewriter`](crate::rewrite::QueryRewriter), consumed
/// once by the merger, then discarded. Construction goes through
/// [`Rewrite::normalized`] so downstream code can rely on the invariants:
/// every string is trimmed and non-empty, alternatives are de-duplicated
/// case-insensitively (against each other and the primary), and there are at
/// most [`MAX_ALTERNATIVES`] of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rewrite {
    pub primary: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Upper bound on alternatives retained after normalization.
pub const MAX_ALTERNATIVES: usize = 3;

impl Rewrite {
    /// A rewrite consisting of just the raw query, unchanged.
    ///
    /// Used as the fallback whenever the rewriter boundary fails or is
    /// disabled: the merger then searches a single variant.
    pub fn passthrough(raw: &str) -> Self {
        Self {
            primary: raw.trim().to_string(),
            alternatives: Vec::new(),
        }
    }

    /// Trim all strings, drop empties, dedup case-insensitively, and cap
    /// the alternatives at [`MAX_ALTERNATIVES`].
    ///
    /// An empty primary after trimming stays empty; callers decide whether
    /// to substitute the raw query.
    pub fn normalized(self) -> Self {
        let mut seen: Vec<String> = Vec::new();
        let mut take = |s: &str| -> Option<String> {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            let key = s.to_lowercase();
            if seen.contains(&key) {
                return None;
            }
            seen.push(key);
            Some(s.to_string())
        };

        let primary = take(&self.primary).unwrap_or_default();
        let alternatives = self
            .alternatives
            .iter()
            .filter_map(|a| take(a))
            .take(MAX_ALTERNATIVES)
            .collect();

        Self {
            primary,
            alternatives,
        }
    }

    /// All variant strings in search order: primary first, then alternatives.
    pub fn variants(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.alternatives.iter().map(|a| a.as_str()))
    }
}
