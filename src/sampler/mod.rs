//! Catalog sampling: gathers a pool of unique, acceptable items by
//! running independent randomized probing strategies against a catalog.

pub mod terms;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogError, CatalogProvider};
use crate::config::SamplerConfig;
use crate::dedup::DedupTracker;
use crate::filter::{validate, CandidateFilter};
use crate::models::{CandidatePool, ConstraintSet, RawItem};
use crate::random::RandomSource;
use terms::{market_for_language, pick_seed_genres, random_targets, TermGenerator, CATEGORIES};

/// Attempt budget per strategy for one sampling run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyBudget {
    pub term_probe: u32,
    pub collection_crawl: u32,
    pub recommendation: u32,
}

impl Default for StrategyBudget {
    fn default() -> Self {
        Self {
            term_probe: 30,
            collection_crawl: 10,
            recommendation: 5,
        }
    }
}

impl StrategyBudget {
    pub fn attempts(&self, kind: StrategyKind) -> u32 {
        match kind {
            StrategyKind::TermProbe => self.term_probe,
            StrategyKind::CollectionCrawl => self.collection_crawl,
            StrategyKind::Recommendation => self.recommendation,
        }
    }

    pub fn total(&self) -> u32 {
        self.term_probe + self.collection_crawl + self.recommendation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    TermProbe,
    CollectionCrawl,
    Recommendation,
}

impl StrategyKind {
    /// Execution order within a run.
    pub const ORDER: [StrategyKind; 3] = [
        StrategyKind::TermProbe,
        StrategyKind::CollectionCrawl,
        StrategyKind::Recommendation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::TermProbe => "term-probe",
            StrategyKind::CollectionCrawl => "collection-crawl",
            StrategyKind::Recommendation => "recommendation",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one strategy within a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyStats {
    pub attempts: u32,
    pub failures: u32,
    pub fetched: usize,
    pub malformed: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub accepted: usize,
}

/// What a sampling run did, per strategy.
#[derive(Debug, Clone, Default)]
pub struct SampleReport {
    stats: HashMap<StrategyKind, StrategyStats>,
    pub reached_target: bool,
}

impl SampleReport {
    pub fn stats(&self, kind: StrategyKind) -> StrategyStats {
        self.stats.get(&kind).cloned().unwrap_or_default()
    }

    fn entry(&mut self, kind: StrategyKind) -> &mut StrategyStats {
        self.stats.entry(kind).or_default()
    }

    pub fn total_attempts(&self) -> u32 {
        self.stats.values().map(|s| s.attempts).sum()
    }

    pub fn total_failures(&self) -> u32 {
        self.stats.values().map(|s| s.failures).sum()
    }

    pub fn total_accepted(&self) -> usize {
        self.stats.values().map(|s| s.accepted).sum()
    }
}

impl fmt::Display for SampleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = StrategyKind::ORDER
            .iter()
            .map(|kind| {
                let s = self.stats(*kind);
                format!(
                    "{}: {} attempts ({} failed), {} fetched, {} accepted, {} rejected, {} malformed, {} duplicate",
                    kind, s.attempts, s.failures, s.fetched, s.accepted, s.rejected, s.malformed, s.duplicates
                )
            })
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Pool plus the report that produced it.
#[derive(Debug)]
pub struct SampleOutcome {
    pub pool: CandidatePool,
    pub report: SampleReport,
}

pub struct CatalogSampler {
    catalog: Arc<dyn CatalogProvider>,
    config: SamplerConfig,
    language: Option<String>,
}

impl CatalogSampler {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        config: SamplerConfig,
        language: Option<String>,
    ) -> Self {
        Self {
            catalog,
            config,
            language,
        }
    }

    pub fn catalog_id(&self) -> &str {
        self.catalog.id()
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Run the strategies in order until `target` unique acceptable items
    /// have been pooled or every budget is spent.
    ///
    /// Failed attempts are logged and counted; they never abort the run.
    /// Accepted ids are admitted into `seen`, so repeated calls with the
    /// same tracker never return an id twice.
    pub async fn sample(
        &self,
        constraints: &ConstraintSet,
        seen: &mut DedupTracker,
        target: usize,
        budget: &StrategyBudget,
        rng: &mut RandomSource,
    ) -> SampleOutcome {
        let filter = CandidateFilter::new(constraints);
        let mut pool = CandidatePool::new();
        let mut report = SampleReport::default();

        log::info!(
            "Sampling {} items from '{}' ({})",
            target,
            self.catalog.id(),
            constraints.summary()
        );

        'strategies: for kind in StrategyKind::ORDER {
            for attempt in 0..budget.attempts(kind) {
                if pool.len() >= target {
                    report.reached_target = true;
                    break 'strategies;
                }
                if attempt > 0 {
                    self.pace(rng).await;
                }

                report.entry(kind).attempts += 1;
                let result = match kind {
                    StrategyKind::TermProbe => self.term_probe(rng).await,
                    StrategyKind::CollectionCrawl => self.collection_crawl(rng).await,
                    StrategyKind::Recommendation => self.recommendation(constraints, rng).await,
                };

                match result {
                    Ok(batch) => {
                        let stats = report.entry(kind);
                        Self::ingest(batch, &filter, seen, &mut pool, stats);
                    }
                    Err(e) => {
                        report.entry(kind).failures += 1;
                        log::warn!("{} attempt {} failed: {}", kind, attempt + 1, e);
                        if let Some(wait) = e.retry_after() {
                            tokio::time::sleep(wait).await;
                        }
                    }
                }
            }
        }
        if pool.len() >= target {
            report.reached_target = true;
        }

        log::info!(
            "Sampling finished with {} candidates after {} attempts ({} failed)",
            pool.len(),
            report.total_attempts(),
            report.total_failures()
        );
        log::debug!("Sample report: {}", report);

        SampleOutcome { pool, report }
    }

    fn ingest(
        batch: Vec<RawItem>,
        filter: &CandidateFilter,
        seen: &mut DedupTracker,
        pool: &mut CandidatePool,
        stats: &mut StrategyStats,
    ) {
        for raw in batch {
            stats.fetched += 1;
            let item = match validate(raw) {
                Ok(item) => item,
                Err(reason) => {
                    stats.malformed += 1;
                    log::trace!("Dropped record: {}", reason);
                    continue;
                }
            };
            if let Err(reason) = filter.check(&item) {
                stats.rejected += 1;
                log::trace!("Rejected '{}': {}", item.title, reason);
                continue;
            }
            if !seen.admit(&item.id) {
                stats.duplicates += 1;
                continue;
            }
            stats.accepted += 1;
            pool.push(item);
        }
    }

    /// Random pause between outbound requests.
    async fn pace(&self, rng: &mut RandomSource) {
        if self.config.max_delay_ms == 0 {
            return;
        }
        let lo = self.config.min_delay_ms.min(self.config.max_delay_ms);
        let ms = rng.range_inclusive(lo, self.config.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn term_probe(&self, rng: &mut RandomSource) -> Result<Vec<RawItem>, CatalogError> {
        let generator = TermGenerator::random(rng);
        let query = generator.generate(rng, chrono::Utc::now().year());
        let offset = rng.uniform_int(self.config.offset_ceiling as usize + 1) as u32;
        let market = self
            .language
            .as_deref()
            .and_then(|lang| market_for_language(lang, rng));

        log::debug!(
            "Term probe {:?} '{}' at offset {} (market {:?})",
            generator,
            query,
            offset,
            market
        );
        self.catalog
            .search(&query, offset, self.config.page_limit, market)
            .await
    }

    async fn collection_crawl(&self, rng: &mut RandomSource) -> Result<Vec<RawItem>, CatalogError> {
        let Some(category) = rng.choose(CATEGORIES).copied() else {
            return Ok(Vec::new());
        };
        let offset = rng.uniform_int(self.config.collection_offset_ceiling as usize + 1) as u32;
        let collections = self
            .catalog
            .list_collections(category, offset, self.config.collection_page_limit)
            .await?;

        let Some(collection) = rng.choose(&collections).cloned() else {
            log::debug!("No collections in '{}' at offset {}", category, offset);
            return Ok(Vec::new());
        };

        let span = collection
            .item_count
            .map(|n| n.saturating_sub(self.config.page_limit))
            .unwrap_or(0);
        let item_offset = rng.uniform_int(span as usize + 1) as u32;

        self.pace(rng).await;
        let members = self
            .catalog
            .list_collection_items(&collection.id, item_offset, self.config.page_limit)
            .await?;

        let k = 1 + rng.uniform_int(self.config.subset_max.max(1));
        let picked: Vec<RawItem> = rng
            .sample_indices(members.len(), k)
            .into_iter()
            .map(|i| members[i].clone())
            .collect();
        log::debug!(
            "Crawled '{}' ({}) in '{}': kept {} of {}",
            collection.name,
            collection.id,
            category,
            picked.len(),
            members.len()
        );
        Ok(picked)
    }

    async fn recommendation(
        &self,
        constraints: &ConstraintSet,
        rng: &mut RandomSource,
    ) -> Result<Vec<RawItem>, CatalogError> {
        let genre_pool: Vec<String> = match &constraints.genre_allowlist {
            Some(allow) if !allow.is_empty() => allow.clone(),
            _ => terms::DEFAULT_GENRE_POOL.iter().map(|g| g.to_string()).collect(),
        };
        let seeds = pick_seed_genres(&genre_pool, rng);
        let targets = random_targets(rng, constraints.max_popularity);
        log::debug!("Recommendations seeded by {:?}", seeds);
        self.catalog
            .recommendations(&seeds, &targets, self.config.recommendation_limit)
            .await
    }
}
