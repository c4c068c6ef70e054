//! The hybrid index: corpus snapshot management and per-query scoring.
//!
//! [`HybridIndex`] owns an immutable corpus snapshot and combines a
//! semantic (cosine) sub-score with a fuzzy (Jaro-Winkler) sub-score into
//! one ranked result list per query.
//!
//! # Concurrency
//!
//! The corpus is an `Arc<Vec<Document>>` behind a readers/writer lock that
//! is only ever held for the pointer operation itself. [`HybridIndex::rebuild`]
//! builds the replacement corpus entirely off to the side — including every
//! embedding call — and publishes it with a single swap, so concurrent
//! searches always see either the fully-old or the fully-new corpus and
//! never wait on provider latency. [`HybridIndex::search`] clones the `Arc`
//! and scores against that snapshot, unaffected by any rebuild that
//! publishes mid-scan.
//!
//! Deadlines are the caller's job: wrap `rebuild`/`search` in
//! `tokio::time::timeout` as the HTTP layer does. A rebuild future dropped
//! before its final swap leaves the previous corpus fully intact.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::{Arc, RwLock};

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::fuzzy;
use crate::models::Item;

/// A catalog item prepared for scoring: the item, its embedding, and the
/// concatenated search text the embedding was computed from.
#[derive(Debug, Clone)]
pub struct Document {
    pub item: Item,
    pub embedding: Vec<f32>,
    pub search_text: String,
}

/// One ranked search hit, with the component sub-scores that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredResult {
    pub item: Item,
    pub score: f64,
    pub why: ScoreBreakdown,
}

/// Explainability payload: the two sub-scores behind a combined score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub semantic: f64,
    pub fuzzy: f64,
}

/// The hybrid semantic + fuzzy index over a catalog snapshot.
///
/// Constructed once with its weights and embedding dependency and passed by
/// handle to the service layer; there is no process-global instance.
pub struct HybridIndex {
    provider: Box<dyn EmbeddingProvider>,
    semantic_weight: f64,
    fuzzy_weight: f64,
    corpus: RwLock<Arc<Vec<Document>>>,
}

impl HybridIndex {
    /// Create an empty index.
    ///
    /// Weights are non-negative reals fixed for the index's lifetime; they
    /// are not required to sum to 1.
    pub fn new(
        provider: Box<dyn EmbeddingProvider>,
        semantic_weight: f64,
        fuzzy_weight: f64,
    ) -> Self {
        Self {
            provider,
            semantic_weight,
            fuzzy_weight,
            corpus: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Number of documents in the current corpus snapshot.
    pub fn corpus_len(&self) -> usize {
        self.snapshot().len()
    }

    fn snapshot(&self) -> Arc<Vec<Document>> {
        // A poisoned lock only holds a fully-published snapshot; keep serving it.
        self.corpus
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the corpus with one built from `items`.
    ///
    /// Items whose search text (title + brand + description) is empty after
    /// trimming are skipped; they cannot match anything and never occupy
    /// storage or embedding calls. Every surviving item is embedded via the
    /// provider. If any embedding fails the whole rebuild fails, naming the
    /// item, and the existing corpus keeps serving queries unchanged.
    ///
    /// Returns the number of documents in the new corpus.
    pub async fn rebuild(&self, items: &[Item]) -> Result<usize> {
        let mut docs = Vec::with_capacity(items.len());
        for item in items {
            let search_text = search_text(item);
            if search_text.is_empty() {
                tracing::debug!(item_id = item.id, "skipping item with empty search text");
                continue;
            }
            let embedding = self
                .provider
                .embed(&search_text)
                .await
                .with_context(|| format!("embed item {}", item.id))?;
            docs.push(Document {
                item: item.clone(),
                embedding,
                search_text,
            });
        }

        let indexed = docs.len();
        let skipped = items.len() - indexed;

        // Single atomic publish; readers holding the old Arc are unaffected.
        *self.corpus.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(docs);

        tracing::info!(indexed, skipped, "corpus rebuilt");
        Ok(indexed)
    }

    /// Score every resident document against `query` and return a ranked list.
    ///
    /// A query that trims to empty matches nothing and returns an empty
    /// list with no error and no provider call. Otherwise the query is
    /// embedded (failure propagates; no fallback here — the caller owns
    /// fallback policy) and each document gets:
    ///
    /// - semantic sub-score: cosine similarity of query and document vectors
    /// - fuzzy sub-score: max Jaro-Winkler over title, brand, description
    /// - combined: `semantic_weight × semantic + fuzzy_weight × fuzzy`
    ///
    /// Results are sorted by combined score descending, ties broken by
    /// ascending item id, then truncated to `limit` when `limit > 0`
    /// (`limit == 0` means no truncation).
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.provider.embed(query).await.context("embed query")?;

        let corpus = self.snapshot();

        let mut results: Vec<ScoredResult> = corpus
            .iter()
            .map(|doc| {
                let semantic = cosine_similarity(&query_vec, &doc.embedding);
                let fuzzy = fuzzy::item_similarity(query, &doc.item);
                ScoredResult {
                    item: doc.item.clone(),
                    score: self.semantic_weight * semantic + self.fuzzy_weight * fuzzy,
                    why: ScoreBreakdown { semantic, fuzzy },
                }
            })
            .collect();

        sort_ranked(&mut results);
        if limit > 0 {
            results.truncate(limit);
        }
        Ok(results)
    }
}

/// Concatenated text an item is embedded and indexed under.
///
/// Title, brand, and description joined by single spaces, trimmed. Empty
/// means the item is unindexable.
pub fn search_text(item: &Item) -> String {
    format!("{} {} {}", item.title, item.brand, item.description)
        .trim()
        .to_string()
}

/// Sort results by combined score descending, then ascending item id.
///
/// The id tie-break makes equal-score orderings deterministic across runs.
pub(crate) fn sort_ranked(results: &mut [ScoredResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.item.id.cmp(&b.item.id))
    });
}
