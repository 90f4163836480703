//! End-to-end discovery sessions against the fixture catalog.

use std::collections::HashSet;
use std::sync::Arc;

use deepcut_lib::build_queue;
use deepcut_lib::catalog::{CatalogDump, FixtureCollection, MemoryCatalog};
use deepcut_lib::config::DeepcutConfig;
use deepcut_lib::database::DatabaseManager;
use deepcut_lib::dedup::HistoryStore;
use deepcut_lib::filter::is_acceptable;
use deepcut_lib::history::SqliteHistory;
use deepcut_lib::models::{RawContainer, RawContributor, RawItem};
use deepcut_lib::queue::QueueState;
use deepcut_lib::sampler::StrategyBudget;
use deepcut_lib::shuffle::ShufflePolicy;

fn raw(id: usize, popularity: u32, explicit: bool, title: &str) -> RawItem {
    RawItem {
        id: Some(format!("trk{:02}", id)),
        name: Some(title.to_string()),
        artists: vec![RawContributor {
            id: Some(format!("art{}", id % 4)),
            name: Some(format!("Artist {}", id % 4)),
        }],
        duration_ms: Some(150_000 + id as u64 * 1000),
        popularity: Some(popularity),
        explicit: Some(explicit),
        album: Some(RawContainer {
            name: Some(format!("Album {}", id % 5)),
            release_date: Some(format!("{}-03-01", 1980 + id)),
            genres: vec!["dub".to_string()],
        }),
        genres: vec![],
        uri: Some(format!("catalog:track:{}", id)),
    }
}

fn dump() -> CatalogDump {
    let mut items: Vec<RawItem> = (0..20)
        .map(|i| raw(i, 10 + i as u32, false, &format!("Deep Cut {}", i)))
        .collect();
    items.push(raw(20, 95, false, "Anthem"));
    items.push(raw(21, 20, true, "Rough Edges"));
    items.push(raw(22, 15, false, "Sunrise (Karaoke Version)"));

    CatalogDump {
        collections: vec![FixtureCollection {
            id: "pl1".to_string(),
            name: "Basement Tapes".to_string(),
            category: "reggae".to_string(),
            item_ids: items.iter().filter_map(|i| i.id.clone()).collect(),
        }],
        items,
    }
}

fn config() -> DeepcutConfig {
    let mut config = DeepcutConfig::default();
    config.sampler.min_delay_ms = 0;
    config.sampler.max_delay_ms = 0;
    config.sampler.budget = StrategyBudget {
        term_probe: 3,
        collection_crawl: 3,
        recommendation: 3,
    };
    config.constraints.max_popularity = 50;
    config.constraints.allow_explicit = false;
    config.constraints.genre_allowlist = Some(vec!["dub".to_string()]);
    config.queue.target_count = 50;
    config.queue.prefetch_threshold = 0;
    config.queue.policy = ShufflePolicy::NoRepeatFirst;
    config
}

async fn sqlite(dir: &tempfile::TempDir) -> Arc<SqliteHistory> {
    let db = DatabaseManager::open(&dir.path().join("history.db"))
        .await
        .unwrap();
    Arc::new(SqliteHistory::new(db.pool))
}

#[tokio::test]
async fn session_serves_only_acceptable_unique_items() {
    let dir = tempfile::tempdir().unwrap();
    let history = sqlite(&dir).await;
    let config = config();
    let catalog = Arc::new(MemoryCatalog::new(dump()));

    let mut queue = build_queue(&config, catalog, history.clone()).await.unwrap();
    assert_eq!(queue.state(), QueueState::Empty);

    let added = queue.request_more(config.queue.target_count).await.unwrap();
    assert!(added > 0);
    assert_eq!(queue.state(), QueueState::Ready);

    let ids: HashSet<&str> = queue.items().iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids.len(), queue.len());
    for item in queue.items() {
        assert!(is_acceptable(item, &config.constraints), "{} slipped through", item.id);
    }
    assert!(!ids.contains("trk20"));
    assert!(!ids.contains("trk21"));
    assert!(!ids.contains("trk22"));

    let len = queue.len();
    for _ in 0..len {
        queue.advance().await.unwrap();
    }
    assert_eq!(queue.state(), QueueState::Exhausted);
    assert_eq!(history.count().await.unwrap(), len as u64);
}

#[tokio::test]
async fn catalog_exhaustion_falls_back_to_replay() {
    let dir = tempfile::tempdir().unwrap();
    let history = sqlite(&dir).await;
    let mut config = config();
    // A single recommendation pass sees the whole fixture.
    config.sampler.budget = StrategyBudget {
        term_probe: 0,
        collection_crawl: 0,
        recommendation: 1,
    };
    let catalog = Arc::new(MemoryCatalog::new(dump()));

    let mut queue = build_queue(&config, catalog, history).await.unwrap();
    queue.request_more(50).await.unwrap();
    let len = queue.len();
    assert_eq!(len, 20);

    for _ in 0..=len {
        queue.advance().await.unwrap();
    }
    queue.wait_for_growth().await;
    assert!(queue.is_catalog_exhausted());
    assert_eq!(queue.len(), len);

    for _ in 0..len {
        assert!(queue.advance().await.is_some());
        assert!(!queue.is_growing());
    }
}

#[tokio::test]
async fn exclude_recent_skips_previous_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let history = sqlite(&dir).await;
    let mut config = config();
    config.sampler.budget = StrategyBudget {
        term_probe: 0,
        collection_crawl: 0,
        recommendation: 1,
    };

    let mut first = build_queue(&config, Arc::new(MemoryCatalog::new(dump())), history.clone())
        .await
        .unwrap();
    first.request_more(50).await.unwrap();
    let mut served = HashSet::new();
    for _ in 0..5 {
        served.insert(first.advance().await.unwrap().id);
    }

    config.queue.exclude_recent = true;
    let mut second = build_queue(&config, Arc::new(MemoryCatalog::new(dump())), history.clone())
        .await
        .unwrap();
    second.request_more(50).await.unwrap();

    assert_eq!(second.len(), 15);
    assert!(second.items().iter().all(|i| !served.contains(&i.id)));
    let recent = history.recent_ids(10).await.unwrap();
    assert_eq!(recent.len(), 5);
}
