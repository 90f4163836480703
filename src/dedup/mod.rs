//! Dedup tracker.
//!
//! Two layers:
//! - a hard, run-scoped set of seen ids shared by every sampler strategy;
//! - a soft, size-bounded history of recently consumed ids, mirrored from a
//!   [`HistoryStore`] and used by the no-repeat ordering policy.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

/// Default cap for the soft history.
pub const DEFAULT_HISTORY_CAP: usize = 100;

/// Persisted consumption history. Persistence itself lives outside this crate.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Most recently consumed ids first, distinct, at most `limit`.
    async fn recent_ids(&self, limit: usize) -> Result<Vec<String>>;

    /// Record one consumption of `id`.
    async fn record(&self, id: &str) -> Result<()>;

    /// Consumption counts for the given ids. Ids never consumed may be absent.
    async fn play_counts(&self, _ids: &[String]) -> Result<HashMap<String, u32>> {
        Ok(HashMap::new())
    }
}

/// Bounded, insertion-ordered set of recently consumed ids.
#[derive(Debug, Clone)]
pub struct RecentHistory {
    order: VecDeque<String>,
    members: HashSet<String>,
    cap: usize,
}

impl RecentHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(cap.min(1024)),
            members: HashSet::new(),
            cap: cap.max(1),
        }
    }

    /// Build from a most-recent-first list, as returned by [`HistoryStore::recent_ids`].
    pub fn from_recent(ids: Vec<String>, cap: usize) -> Self {
        let mut history = Self::new(cap);
        for id in ids.into_iter().rev() {
            history.push(id);
        }
        history
    }

    /// Mark `id` as the most recent entry, evicting the oldest past the cap.
    pub fn push(&mut self, id: String) {
        if self.members.contains(&id) {
            self.order.retain(|existing| existing != &id);
        } else {
            self.members.insert(id.clone());
        }
        self.order.push_back(id);

        while self.order.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Most recent first.
    pub fn ids(&self) -> Vec<String> {
        self.order.iter().rev().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

/// Seen-set state for one discovery run plus the soft history mirror.
#[derive(Debug, Clone)]
pub struct DedupTracker {
    seen: HashSet<String>,
    recent: RecentHistory,
}

impl DedupTracker {
    pub fn new(history_cap: usize) -> Self {
        Self {
            seen: HashSet::new(),
            recent: RecentHistory::new(history_cap),
        }
    }

    pub fn with_history(recent: RecentHistory) -> Self {
        Self {
            seen: HashSet::new(),
            recent,
        }
    }

    /// Admit `id` into the run. Returns `false` if it was already seen.
    pub fn admit(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        true
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Treat every id in the soft history as already seen, turning it into a
    /// hard exclusion for this run.
    pub fn exclude_recent(&mut self) {
        for id in self.recent.order.iter() {
            self.seen.insert(id.clone());
        }
    }

    pub fn is_recent(&self, id: &str) -> bool {
        self.recent.contains(id)
    }

    pub fn recent(&self) -> &RecentHistory {
        &self.recent
    }

    pub fn record_consumed(&mut self, id: &str) {
        self.recent.push(id.to_string());
    }

    pub fn replace_history(&mut self, recent: RecentHistory) {
        self.recent = recent;
    }

    /// Forget the run-scoped seen set, keeping the soft history.
    pub fn reset_run(&mut self) {
        self.seen.clear();
    }
}

/// In-process [`HistoryStore`], used when no database is configured.
pub struct MemoryHistory {
    inner: Mutex<MemoryHistoryInner>,
}

struct MemoryHistoryInner {
    recent: RecentHistory,
    counts: HashMap<String, u32>,
}

impl MemoryHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryHistoryInner {
                recent: RecentHistory::new(cap),
                counts: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn recent_ids(&self, limit: usize) -> Result<Vec<String>> {
        let inner = self.inner.lock();
        Ok(inner.recent.ids().into_iter().take(limit).collect())
    }

    async fn record(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.recent.push(id.to_string());
        *inner.counts.entry(id.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn play_counts(&self, ids: &[String]) -> Result<HashMap<String, u32>> {
        let inner = self.inner.lock();
        Ok(ids
            .iter()
            .filter_map(|id| inner.counts.get(id).map(|c| (id.clone(), *c)))
            .collect())
    }
}
