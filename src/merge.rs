//! Multi-variant search and result reconciliation.
//!
//! The merger fans a [`Rewrite`] out over the [`HybridIndex`] — primary
//! first, then each alternative in order — and reconciles the per-variant
//! rankings into one list, keeping the best combined score seen for each
//! item.

use anyhow::Result;
use std::collections::HashMap;

use crate::index::{sort_ranked, HybridIndex, ScoredResult};
use crate::models::Rewrite;

/// Search every variant of `rewrite` and merge the rankings.
///
/// A failing variant contributes nothing; its failure is logged and
/// absorbed, never escalated — unless *every* variant fails, in which case
/// the last error is returned. Deduplication is by item id with max-wins
/// on combined score; on an exact score tie the first-seen variant's
/// sub-scores are retained (variants run primary-first, so ties resolve in
/// favor of the primary). The merged set is re-sorted descending by score,
/// ties by ascending item id, then truncated to `limit` when `limit > 0`.
pub async fn merged_search(
    index: &HybridIndex,
    rewrite: &Rewrite,
    limit: usize,
) -> Result<Vec<ScoredResult>> {
    let mut best: HashMap<u64, ScoredResult> = HashMap::new();
    let mut succeeded = 0usize;
    let mut last_err = None;

    for variant in rewrite.variants() {
        match index.search(variant, limit).await {
            Ok(results) => {
                succeeded += 1;
                for result in results {
                    // Strictly greater: on an exact tie the earlier variant wins.
                    let improves = best
                        .get(&result.item.id)
                        .map_or(true, |prev| result.score > prev.score);
                    if improves {
                        best.insert(result.item.id, result);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(variant, error = %err, "query variant failed, skipping");
                last_err = Some(err);
            }
        }
    }

    if succeeded == 0 {
        if let Some(err) = last_err {
            return Err(err);
        }
    }

    let mut merged: Vec<ScoredResult> = best.into_values().collect();
    sort_ranked(&mut merged);
    if limit > 0 {
        merged.truncate(limit);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingProvider;
    use crate::models::Item;
    use anyhow::bail;
    use async_trait::async_trait;
    use chrono::Utc;

    /// Provider that maps known texts to fixed vectors and fails on texts
    /// containing "boom".
    struct VariantProvider;

    #[async_trait]
    impl EmbeddingProvider for VariantProvider {
        fn model_name(&self) -> &str {
            "variant-mock"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("boom") {
                bail!("mock provider refused {text:?}");
            }
            Ok(match text {
                // Document texts
                "Alpha Acme first" => vec![1.0, 0.0],
                "Beta Acme second" => vec![0.0, 1.0],
                // Query variants
                "q-alpha" => vec![1.0, 0.0],
                "q-alpha-twin" => vec![1.0, 0.0],
                "q-mixed" => vec![0.6, 0.8],
                _ => vec![1.0, 1.0],
            })
        }
    }

    fn item(id: u64, title: &str, description: &str) -> Item {
        Item {
            id,
            seller_id: 0,
            category_id: 0,
            title: title.to_string(),
            description: description.to_string(),
            brand: "Acme".to_string(),
            status: 0,
            score: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn semantic_only_index() -> HybridIndex {
        // Fuzzy weight 0 so scores are driven purely by the mock vectors.
        let ix = HybridIndex::new(Box::new(VariantProvider), 1.0, 0.0);
        ix.rebuild(&[item(1, "Alpha", "first"), item(2, "Beta", "second")])
            .await
            .unwrap();
        ix
    }

    #[tokio::test]
    async fn test_merge_keeps_max_score_per_item() {
        let ix = semantic_only_index().await;
        // q-alpha: item 1 → 1.0, item 2 → 0.0
        // q-mixed: item 1 → 0.6, item 2 → 0.8
        let rewrite = Rewrite {
            primary: "q-alpha".to_string(),
            alternatives: vec!["q-mixed".to_string()],
        };

        let merged = merged_search(&ix, &rewrite, 0).await.unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].item.id, 1);
        assert!((merged[0].score - 1.0).abs() < 1e-9);
        assert_eq!(merged[1].item.id, 2);
        assert!((merged[1].score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failing_alternative_is_absorbed() {
        let ix = semantic_only_index().await;
        let rewrite = Rewrite {
            primary: "q-alpha".to_string(),
            alternatives: vec!["boom".to_string(), "q-mixed".to_string()],
        };

        let merged = merged_search(&ix, &rewrite, 0).await.unwrap();
        // Both surviving variants contributed.
        assert_eq!(merged.len(), 2);
        assert!((merged[1].score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_all_variants_failing_is_an_error() {
        let ix = semantic_only_index().await;
        let rewrite = Rewrite {
            primary: "boom".to_string(),
            alternatives: vec!["boom again".to_string()],
        };

        let err = merged_search(&ix, &rewrite, 0).await.unwrap_err();
        assert!(err.to_string().contains("embed query"));
    }

    #[tokio::test]
    async fn test_exact_tie_retains_first_seen_subscores() {
        let ix = semantic_only_index().await;
        // Both variants embed to the same vector, so combined scores tie
        // exactly for every item; the recorded fuzzy sub-score differs
        // because the query strings differ. The primary's breakdown wins.
        let rewrite = Rewrite {
            primary: "q-alpha".to_string(),
            alternatives: vec!["q-alpha-twin".to_string()],
        };

        let primary_only = ix.search("q-alpha", 0).await.unwrap();
        let merged = merged_search(&ix, &rewrite, 0).await.unwrap();

        assert_eq!(merged.len(), primary_only.len());
        for (m, p) in merged.iter().zip(primary_only.iter()) {
            assert_eq!(m.item.id, p.item.id);
            assert_eq!(m.score, p.score);
            assert_eq!(m.why.fuzzy, p.why.fuzzy);
        }
    }

    #[tokio::test]
    async fn test_merge_truncates_to_limit() {
        let ix = semantic_only_index().await;
        let rewrite = Rewrite {
            primary: "q-mixed".to_string(),
            alternatives: vec!["q-alpha".to_string()],
        };
        let merged = merged_search(&ix, &rewrite, 1).await.unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].item.id, 1);
    }

    #[tokio::test]
    async fn test_single_variant_passthrough() {
        let ix = semantic_only_index().await;
        let rewrite = Rewrite::passthrough("q-alpha");
        let merged = merged_search(&ix, &rewrite, 0).await.unwrap();
        let direct = ix.search("q-alpha", 0).await.unwrap();
        assert_eq!(merged.len(), direct.len());
        for (m, d) in merged.iter().zip(direct.iter()) {
            assert_eq!(m.item.id, d.item.id);
            assert_eq!(m.score, d.score);
        }
    }
}
