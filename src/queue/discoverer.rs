use std::sync::Arc;

use crate::dedup::{DedupTracker, HistoryStore, RecentHistory};
use crate::errors::{DiscoveryError, Result};
use crate::models::{ConstraintSet, Item};
use crate::random::RandomSource;
use crate::sampler::{CatalogSampler, StrategyBudget};
use crate::shuffle::{self, ShufflePolicy};

/// Everything one discovery run mutates: the sampler, the seen set and the
/// random source. Owned by exactly one task at a time.
pub struct Discoverer {
    sampler: CatalogSampler,
    dedup: DedupTracker,
    rng: RandomSource,
    constraints: ConstraintSet,
    budget: StrategyBudget,
    history: Arc<dyn HistoryStore>,
    history_cap: usize,
    exclude_recent: bool,
}

impl Discoverer {
    pub fn new(
        sampler: CatalogSampler,
        constraints: ConstraintSet,
        history: Arc<dyn HistoryStore>,
        history_cap: usize,
    ) -> Self {
        let budget = sampler.config().budget;
        Self {
            sampler,
            dedup: DedupTracker::new(history_cap),
            rng: RandomSource::new(),
            constraints,
            budget,
            history,
            history_cap,
            exclude_recent: false,
        }
    }

    pub fn with_budget(mut self, budget: StrategyBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Treat recent history as a hard exclusion instead of a soft one.
    pub fn with_exclude_recent(mut self, exclude: bool) -> Self {
        self.exclude_recent = exclude;
        self
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn dedup(&self) -> &DedupTracker {
        &self.dedup
    }

    /// Mirror the persisted history into the soft dedup layer.
    pub async fn load_history(&mut self) -> Result<()> {
        let ids = self
            .history
            .recent_ids(self.history_cap)
            .await
            .map_err(|e| DiscoveryError::History(e.to_string()))?;
        log::info!("Loaded {} recent ids from history", ids.len());
        self.dedup
            .replace_history(RecentHistory::from_recent(ids, self.history_cap));
        if self.exclude_recent {
            self.dedup.exclude_recent();
        }
        Ok(())
    }

    pub fn record_consumed(&mut self, id: &str) {
        self.dedup.record_consumed(id);
    }

    /// Forget what this run has seen. The soft history is kept.
    pub fn reset_run(&mut self) {
        self.dedup.reset_run();
        if self.exclude_recent {
            self.dedup.exclude_recent();
        }
    }

    /// Sample, annotate and order one batch.
    ///
    /// Returns `EmptyResult` when nothing acceptable was found or the
    /// policy discarded everything that was.
    pub async fn discover(&mut self, target: usize, policy: ShufflePolicy) -> Result<Vec<Item>> {
        let outcome = self
            .sampler
            .sample(
                &self.constraints,
                &mut self.dedup,
                target,
                &self.budget,
                &mut self.rng,
            )
            .await;
        let mut pool = outcome.pool;

        if pool.is_empty() {
            return Err(DiscoveryError::EmptyResult {
                constraints: self.constraints.summary(),
            });
        }

        let ids: Vec<String> = pool.items().iter().map(|i| i.id.clone()).collect();
        match self.history.play_counts(&ids).await {
            Ok(counts) => {
                for item in pool.items_mut() {
                    item.play_count = Some(counts.get(&item.id).copied().unwrap_or(0));
                }
            }
            Err(e) => log::warn!("Could not load play counts: {}", e),
        }

        let order = shuffle::order(pool, policy, self.dedup.recent(), &mut self.rng);
        if order.is_empty() {
            log::info!("Policy '{}' left nothing to play", policy);
            return Err(DiscoveryError::EmptyResult {
                constraints: self.constraints.summary(),
            });
        }
        log::info!("Discovered {} items ordered by '{}'", order.len(), policy);
        Ok(order)
    }
}
