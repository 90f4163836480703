//! Property-based tests for ordering, dedup, filtering and the queue cursor.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use deepcut_lib::catalog::{CatalogError, CatalogProvider};
use deepcut_lib::config::{QueueConfig, SamplerConfig};
use deepcut_lib::dedup::{DedupTracker, MemoryHistory, RecentHistory};
use deepcut_lib::filter::is_acceptable;
use deepcut_lib::models::{
    AudioTargets, CandidatePool, Collection, ConstraintSet, Item, RawContainer, RawContributor,
    RawItem,
};
use deepcut_lib::queue::{Discoverer, QueueManager};
use deepcut_lib::random::RandomSource;
use deepcut_lib::sampler::{CatalogSampler, StrategyBudget};
use deepcut_lib::shuffle::{self, ShufflePolicy};

// ===== Helpers =====

fn item(id: String, genre: Option<String>, play_count: Option<u32>) -> Item {
    Item {
        id: id.clone(),
        title: format!("Title {}", id),
        contributors: vec!["Artist".to_string()],
        duration_ms: 200_000,
        popularity: 10,
        explicit: false,
        release_date: Some("2005".to_string()),
        container_name: "Album".to_string(),
        genres: genre.into_iter().collect(),
        uri: None,
        play_count,
    }
}

fn arbitrary_items() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec(
        (
            proptest::option::of(prop::sample::select(vec!["dub", "ska", "folk", "jazz"])),
            proptest::option::of(0u32..3),
        ),
        0..40,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (genre, plays))| item(format!("id{}", i), genre.map(str::to_string), plays))
            .collect()
    })
}

fn sorted_ids(items: &[Item]) -> Vec<String> {
    let mut ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
    ids.sort();
    ids
}

fn policy() -> impl Strategy<Value = ShufflePolicy> {
    prop::sample::select(ShufflePolicy::ALL.to_vec())
}

/// Every search returns the same fixed page.
struct FixedCatalog {
    items: Vec<RawItem>,
}

#[async_trait]
impl CatalogProvider for FixedCatalog {
    fn id(&self) -> &str {
        "fixed"
    }

    async fn search(
        &self,
        _query: &str,
        _offset: u32,
        _limit: u32,
        _market: Option<&str>,
    ) -> Result<Vec<RawItem>, CatalogError> {
        Ok(self.items.clone())
    }

    async fn list_collections(
        &self,
        _category: &str,
        _offset: u32,
        _limit: u32,
    ) -> Result<Vec<Collection>, CatalogError> {
        Ok(vec![])
    }

    async fn list_collection_items(
        &self,
        _collection_id: &str,
        _offset: u32,
        _limit: u32,
    ) -> Result<Vec<RawItem>, CatalogError> {
        Ok(vec![])
    }

    async fn recommendations(
        &self,
        _seed_genres: &[String],
        _targets: &AudioTargets,
        _limit: u32,
    ) -> Result<Vec<RawItem>, CatalogError> {
        Ok(vec![])
    }
}

fn raw(id: usize) -> RawItem {
    RawItem {
        id: Some(format!("r{}", id)),
        name: Some(format!("Piece {}", id)),
        artists: vec![RawContributor {
            id: None,
            name: Some("Ensemble".into()),
        }],
        duration_ms: Some(120_000),
        popularity: Some(5),
        explicit: Some(false),
        album: Some(RawContainer {
            name: Some("Field Recordings".into()),
            release_date: Some("1970".into()),
            genres: vec![],
        }),
        genres: vec![],
        uri: None,
    }
}

fn queue_over(len: usize) -> QueueManager {
    let history = Arc::new(MemoryHistory::new(100));
    let catalog = Arc::new(FixedCatalog {
        items: (0..len).map(raw).collect(),
    });
    let sampler = CatalogSampler::new(
        catalog,
        SamplerConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
            ..SamplerConfig::default()
        },
        None,
    );
    let discoverer = Discoverer::new(sampler, ConstraintSet::default(), history.clone(), 100)
        .with_budget(StrategyBudget {
            term_probe: 1,
            collection_crawl: 0,
            recommendation: 0,
        });
    QueueManager::new(
        discoverer,
        history,
        QueueConfig {
            prefetch_threshold: 0,
            ..QueueConfig::default()
        },
    )
}

// ===== Property Tests =====

proptest! {
    /// Property: every policy except unplayed-only is a permutation of its input
    #[test]
    fn ordering_is_a_bijection(items in arbitrary_items(), policy in policy()) {
        let mut rng = RandomSource::new();
        let recent = RecentHistory::from_recent(vec!["id0".to_string(), "id3".to_string()], 10);
        let expected = sorted_ids(&items);

        let ordered = shuffle::order(CandidatePool::from(items.clone()), policy, &recent, &mut rng);

        if policy == ShufflePolicy::UnplayedOnly {
            let unplayed: Vec<Item> = items.into_iter().filter(|i| i.is_unplayed()).collect();
            prop_assert_eq!(sorted_ids(&ordered), sorted_ids(&unplayed));
        } else {
            prop_assert_eq!(sorted_ids(&ordered), expected);
        }
    }

    /// Property: the raw Fisher-Yates pass keeps the multiset of values
    #[test]
    fn fisher_yates_keeps_multiset(values in prop::collection::vec(0u8..5, 0..100)) {
        let mut rng = RandomSource::new();
        let mut shuffled = values.clone();
        shuffle::fisher_yates(&mut shuffled, &mut rng);

        let mut a = values;
        let mut b = shuffled;
        a.sort();
        b.sort();
        prop_assert_eq!(a, b);
    }

    /// Property: unplayed-first never serves a played item before an unplayed one
    #[test]
    fn unplayed_first_partitions(items in arbitrary_items()) {
        let mut rng = RandomSource::new();
        let ordered = shuffle::unplayed_first(items, &mut rng);
        let first_played = ordered.iter().position(|i| !i.is_unplayed()).unwrap_or(ordered.len());
        prop_assert!(ordered[first_played..].iter().all(|i| !i.is_unplayed()));
    }

    /// Property: the seen set admits each id exactly once
    #[test]
    fn dedup_admits_each_id_once(ids in prop::collection::vec("[a-e]{1,2}", 0..60)) {
        let mut tracker = DedupTracker::new(10);
        let admitted: Vec<&String> = ids.iter().filter(|id| tracker.admit(id)).collect();
        let unique: HashSet<&String> = ids.iter().collect();

        prop_assert_eq!(admitted.len(), unique.len());
        prop_assert_eq!(tracker.seen_len(), unique.len());
    }

    /// Property: popularity above the ceiling is always rejected
    #[test]
    fn popularity_ceiling_holds(popularity in 0u8..=100, max in 0u8..=100) {
        let mut it = item("p".to_string(), None, None);
        it.popularity = popularity;
        let constraints = ConstraintSet { max_popularity: max, ..ConstraintSet::default() };
        prop_assert_eq!(is_acceptable(&it, &constraints), popularity <= max);
    }

    /// Property: the cursor always points into the queue and retreat never grows it
    #[test]
    fn queue_cursor_stays_in_bounds(
        len in 1usize..8,
        operations in prop::collection::vec(any::<bool>(), 1..40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let mut queue = queue_over(len);
            queue.request_more(50).await.unwrap();
            assert_eq!(queue.len(), len);

            for forward in operations {
                let before = queue.len();
                let served = if forward {
                    queue.advance().await
                } else {
                    queue.retreat().await
                };
                let served = served.expect("non-empty queue always serves");
                let cursor = queue.cursor().expect("cursor set after serving");

                assert!(cursor < queue.len());
                assert_eq!(queue.items()[cursor].id, served.id);
                if !forward {
                    assert_eq!(queue.len(), before);
                }
            }
        });
    }
}
