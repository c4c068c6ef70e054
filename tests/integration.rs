//! End-to-end scenarios for the index and merger against a deterministic
//! in-memory embedding provider.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use product_search::embedding::EmbeddingProvider;
use product_search::index::HybridIndex;
use product_search::merge::merged_search;
use product_search::models::{Item, Rewrite};

/// Provider that returns the same vector for every text, optionally after a
/// delay. Equal vectors give every document an identical semantic sub-score,
/// so rankings are decided by the fuzzy term — which is exactly what the
/// catalog scenarios below exercise.
struct UniformProvider {
    delay: Duration,
}

impl UniformProvider {
    fn instant() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    fn slow(millis: u64) -> Self {
        Self {
            delay: Duration::from_millis(millis),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for UniformProvider {
    fn model_name(&self) -> &str {
        "uniform-mock"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(vec![0.5, 0.5, 0.5, 0.5])
    }
}

fn item(id: u64, title: &str, brand: &str, description: &str) -> Item {
    Item {
        id,
        seller_id: 0,
        category_id: 0,
        title: title.to_string(),
        description: description.to_string(),
        brand: brand.to_string(),
        status: 0,
        score: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn phone_catalog() -> Vec<Item> {
    vec![
        item(1, "Apple iPhone 14 Pro", "Apple", "6.1-inch, A16 Bionic, 48MP camera"),
        item(2, "Samsung Galaxy S23", "Samsung", "Dynamic AMOLED 2X, Snapdragon"),
        item(3, "Google Pixel 8", "Google", "Tensor G3, excellent camera"),
        item(4, "Nokia Lumia 950", "Nokia", "PureView camera, AMOLED display"),
    ]
}

#[tokio::test]
async fn test_phone_scenario_ranks_iphone_first() {
    let ix = HybridIndex::new(Box::new(UniformProvider::instant()), 0.70, 0.30);
    ix.rebuild(&phone_catalog()).await.unwrap();

    let rewrite = Rewrite {
        primary: "iphone 14".to_string(),
        alternatives: vec!["apple iphone".to_string()],
    };

    let results = merged_search(&ix, &rewrite, 10).await.unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(
        results[0].item.title, "Apple iPhone 14 Pro",
        "expected the textual-overlap winner first, got {:?}",
        results
            .iter()
            .map(|r| (r.item.title.clone(), r.score))
            .collect::<Vec<_>>()
    );
    // Its fuzzy sub-score is near-maximal against the variants; everyone
    // shares the same semantic sub-score by construction.
    assert!(results[0].why.fuzzy > results[1].why.fuzzy);
}

#[tokio::test]
async fn test_empty_query_through_full_pipeline() {
    let ix = HybridIndex::new(Box::new(UniformProvider::instant()), 0.70, 0.30);
    ix.rebuild(&phone_catalog()).await.unwrap();

    let results = merged_search(&ix, &Rewrite::passthrough("   "), 10)
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_merged_truncation_law() {
    let ix = HybridIndex::new(Box::new(UniformProvider::instant()), 0.70, 0.30);
    ix.rebuild(&phone_catalog()).await.unwrap();

    let rewrite = Rewrite {
        primary: "camera phone".to_string(),
        alternatives: vec!["smartphone".to_string()],
    };

    for k in 1..=6usize {
        let results = merged_search(&ix, &rewrite, k).await.unwrap();
        assert!(results.len() <= k);
    }
    let all = merged_search(&ix, &rewrite, 0).await.unwrap();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn test_unindexable_item_never_surfaces() {
    let ix = HybridIndex::new(Box::new(UniformProvider::instant()), 0.70, 0.30);
    let mut items = phone_catalog();
    items.push(item(42, "", "", "   "));

    let indexed = ix.rebuild(&items).await.unwrap();
    assert!(indexed < items.len());
    assert_eq!(indexed, 4);

    let results = merged_search(&ix, &Rewrite::passthrough("anything at all"), 0)
        .await
        .unwrap();
    assert!(results.iter().all(|r| r.item.id != 42));
}

#[tokio::test]
async fn test_concurrent_searches_see_whole_corpus_snapshots() {
    let ix = Arc::new(HybridIndex::new(
        Box::new(UniformProvider::slow(10)),
        0.70,
        0.30,
    ));

    let old_items = vec![item(1, "Alpha", "Acme", "one"), item(2, "Beta", "Acme", "two")];
    let new_items = vec![
        item(3, "Gamma", "Acme", "three"),
        item(4, "Delta", "Acme", "four"),
        item(5, "Epsilon", "Acme", "five"),
    ];
    ix.rebuild(&old_items).await.unwrap();

    let old_ids: BTreeSet<u64> = old_items.iter().map(|i| i.id).collect();
    let new_ids: BTreeSet<u64> = new_items.iter().map(|i| i.id).collect();

    let rebuild = {
        let ix = ix.clone();
        tokio::spawn(async move { ix.rebuild(&new_items).await })
    };

    // Searches racing the rebuild must observe exactly the old or exactly
    // the new corpus, never a mix of the two.
    for _ in 0..20 {
        let results = ix.search("acme", 0).await.unwrap();
        let seen: BTreeSet<u64> = results.iter().map(|r| r.item.id).collect();
        assert!(
            seen == old_ids || seen == new_ids,
            "observed a partially rebuilt corpus: {seen:?}"
        );
    }

    rebuild.await.unwrap().unwrap();

    let results = ix.search("acme", 0).await.unwrap();
    let seen: BTreeSet<u64> = results.iter().map(|r| r.item.id).collect();
    assert_eq!(seen, new_ids);
}

#[tokio::test]
async fn test_cancelled_rebuild_leaves_corpus_intact() {
    let ix = HybridIndex::new(Box::new(UniformProvider::slow(50)), 0.70, 0.30);

    let old_items = vec![item(1, "Alpha", "Acme", "one"), item(2, "Beta", "Acme", "two")];
    ix.rebuild(&old_items).await.unwrap();
    assert_eq!(ix.corpus_len(), 2);

    // Deadline expires while the replacement corpus is still embedding.
    let replacement: Vec<Item> = (10..20)
        .map(|id| item(id, &format!("Item {id}"), "Acme", "replacement"))
        .collect();
    let outcome = tokio::time::timeout(Duration::from_millis(120), ix.rebuild(&replacement)).await;
    assert!(outcome.is_err(), "rebuild should have been cut off");

    // Previous corpus still serves, unchanged.
    assert_eq!(ix.corpus_len(), 2);
    let results = ix.search("alpha", 0).await.unwrap();
    let ids: BTreeSet<u64> = results.iter().map(|r| r.item.id).collect();
    assert_eq!(ids, BTreeSet::from([1, 2]));
}
