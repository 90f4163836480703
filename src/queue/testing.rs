//! Shared fixtures for queue tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::Discoverer;
use crate::catalog::{CatalogError, CatalogProvider};
use crate::config::SamplerConfig;
use crate::dedup::HistoryStore;
use crate::models::{AudioTargets, Collection, ConstraintSet, RawContainer, RawContributor, RawItem};
use crate::sampler::{CatalogSampler, StrategyBudget};

pub fn raw(id: &str, genre: &str) -> RawItem {
    RawItem {
        id: Some(id.into()),
        name: Some(format!("tune {}", id)),
        artists: vec![RawContributor {
            id: None,
            name: Some("Player".into()),
        }],
        duration_ms: Some(180_000),
        popularity: Some(12),
        explicit: Some(false),
        album: Some(RawContainer {
            name: Some("Sessions".into()),
            release_date: Some("1999".into()),
            genres: vec![genre.into()],
        }),
        genres: vec![],
        uri: None,
    }
}

/// Answers every search with the next scripted batch; empty once drained.
#[derive(Default)]
pub struct BatchCatalog {
    batches: Mutex<Vec<Vec<RawItem>>>,
}

impl BatchCatalog {
    pub fn new(batches: Vec<Vec<RawItem>>) -> Self {
        let mut batches = batches;
        batches.reverse();
        Self {
            batches: Mutex::new(batches),
        }
    }
}

#[async_trait]
impl CatalogProvider for BatchCatalog {
    fn id(&self) -> &str {
        "batches"
    }

    async fn search(
        &self,
        _query: &str,
        _offset: u32,
        _limit: u32,
        _market: Option<&str>,
    ) -> Result<Vec<RawItem>, CatalogError> {
        Ok(self.batches.lock().pop().unwrap_or_default())
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

/// Panics on the first search.
pub struct PanickingCatalog;

#[async_trait]
impl CatalogProvider for PanickingCatalog {
    fn id(&self) -> &str {
        "panicking"
    }

    async fn search(
        &self,
        query: &str,
        _offset: u32,
        _limit: u32,
        _market: Option<&str>,
    ) -> Result<Vec<RawItem>, CatalogError> {
        panic!("search for '{}' blew up", query)
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

/// A discoverer that makes exactly one search per run.
pub fn discoverer(batches: Vec<Vec<RawItem>>, history: Arc<dyn HistoryStore>) -> Discoverer {
    discoverer_over(Arc::new(BatchCatalog::new(batches)), history)
}

pub fn discoverer_over(catalog: Arc<dyn CatalogProvider>, history: Arc<dyn HistoryStore>) -> Discoverer {
    let config = SamplerConfig {
        min_delay_ms: 0,
        max_delay_ms: 0,
        ..SamplerConfig::default()
    };
    let sampler = CatalogSampler::new(catalog, config, None);
    Discoverer::new(sampler, ConstraintSet::default(), history, 10).with_budget(StrategyBudget {
        term_probe: 1,
        collection_crawl: 0,
        recommendation: 0,
    })
}

pub fn batch(ids: &[&str]) -> Vec<RawItem> {
    ids.iter().map(|id| raw(id, "folk")).collect()
}
