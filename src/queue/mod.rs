//! Queue manager: a growing play order with a consumption cursor.
//!
//! The manager is the single writer of the backing sequence and cursor.
//! Growth runs execute on a spawned task that owns the [`Discoverer`] and
//! hand both the finished batch and the discoverer back through the event
//! channel, so a batch is appended in one step.

mod discoverer;
#[cfg(test)]
pub(crate) mod testing;

pub use discoverer::Discoverer;

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::config::QueueConfig;
use crate::dedup::HistoryStore;
use crate::errors::{DiscoveryError, Result};
use crate::models::Item;
use crate::shuffle::ShufflePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    /// Nothing queued and nothing being fetched.
    Empty,
    /// A discovery run is in flight.
    Populating,
    /// Unserved items remain.
    Ready,
    /// Every queued item has been served, or the catalog ran dry.
    Exhausted,
}

pub enum QueueEvent {
    /// Playback of the current item finished.
    ItemEnded,
    /// The listener skipped ahead.
    Skip,
    Previous,
    GrowthCompleted {
        generation: u64,
        result: Result<Vec<Item>>,
        discoverer: Box<Discoverer>,
    },
    Clear,
    Shutdown,
}

impl std::fmt::Debug for QueueEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueEvent::ItemEnded => write!(f, "ItemEnded"),
            QueueEvent::Skip => write!(f, "Skip"),
            QueueEvent::Previous => write!(f, "Previous"),
            QueueEvent::GrowthCompleted {
                generation, result, ..
            } => match result {
                Ok(batch) => write!(f, "GrowthCompleted(gen {}, {} items)", generation, batch.len()),
                Err(e) => write!(f, "GrowthCompleted(gen {}, {})", generation, e),
            },
            QueueEvent::Clear => write!(f, "Clear"),
            QueueEvent::Shutdown => write!(f, "Shutdown"),
        }
    }
}

enum Wake {
    Event(Option<QueueEvent>),
    Joined(std::result::Result<(), JoinError>),
}

pub struct QueueManager {
    items: Vec<Item>,
    /// Index of the item last served.
    cursor: Option<usize>,
    /// First index of a pending batch to jump to after a temporary wrap.
    resume_at: Option<usize>,
    state: QueueState,
    /// `None` while a growth task owns it.
    discoverer: Option<Discoverer>,
    growth_task: Option<JoinHandle<()>>,
    /// The growth task died holding the discoverer.
    discoverer_lost: bool,
    history: Arc<dyn HistoryStore>,
    config: QueueConfig,
    generation: u64,
    /// Set when a run came back empty; cleared by `clear` or an explicit
    /// `request_more`.
    catalog_exhausted: bool,
    /// A growth was asked for while a stale run still held the discoverer.
    growth_wanted: bool,
    reset_on_return: bool,
    /// Consumptions that happened while the discoverer was away.
    pending_consumed: Vec<String>,
    deferred: VecDeque<QueueEvent>,
    events_tx: mpsc::UnboundedSender<QueueEvent>,
    events_rx: mpsc::UnboundedReceiver<QueueEvent>,
}

impl QueueManager {
    pub fn new(discoverer: Discoverer, history: Arc<dyn HistoryStore>, config: QueueConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            items: Vec::new(),
            cursor: None,
            resume_at: None,
            state: QueueState::Empty,
            discoverer: Some(discoverer),
            growth_task: None,
            discoverer_lost: false,
            history,
            config,
            generation: 0,
            catalog_exhausted: false,
            growth_wanted: false,
            reset_on_return: false,
            pending_consumed: Vec::new(),
            deferred: VecDeque::new(),
            events_tx,
            events_rx,
        }
    }

    /// Handle for delivering events to this manager.
    pub fn sender(&self) -> mpsc::UnboundedSender<QueueEvent> {
        self.events_tx.clone()
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn current(&self) -> Option<&Item> {
        self.cursor.and_then(|i| self.items.get(i))
    }

    pub fn is_growing(&self) -> bool {
        self.discoverer.is_none() && !self.discoverer_lost
    }

    pub fn is_catalog_exhausted(&self) -> bool {
        self.catalog_exhausted
    }

    pub fn policy(&self) -> ShufflePolicy {
        self.config.policy
    }

    /// Applies to batches discovered from now on.
    pub fn set_policy(&mut self, policy: ShufflePolicy) {
        log::info!("Queue policy set to '{}'", policy);
        self.config.policy = policy;
    }

    /// Unserved items left before the cursor reaches the end.
    pub fn remaining(&self) -> usize {
        if let Some(resume) = self.resume_at {
            return self.items.len().saturating_sub(resume);
        }
        match self.cursor {
            None => self.items.len(),
            Some(i) => self.items.len().saturating_sub(i + 1),
        }
    }

    /// Run discovery in the foreground and append the result.
    ///
    /// Waits for an in-flight background run first. Returns the number of
    /// items appended.
    pub async fn request_more(&mut self, target: usize) -> Result<usize> {
        self.wait_for_growth().await;
        let Some(mut discoverer) = self.discoverer.take() else {
            return Err(DiscoveryError::Internal("discoverer unavailable".to_string()));
        };
        self.catalog_exhausted = false;
        self.state = QueueState::Populating;

        log::info!("Requesting {} more items", target);
        let result = discoverer.discover(target, self.config.policy).await;
        self.apply_growth(self.generation, result, discoverer)
    }

    /// Serve the next item, growing or wrapping at the end.
    pub async fn advance(&mut self) -> Option<Item> {
        if self.items.is_empty() {
            self.start_growth();
            self.settle();
            return None;
        }

        let len = self.items.len();
        let index = match self.resume_at {
            Some(resume) if resume < len => {
                self.resume_at = None;
                resume
            }
            // Pending batch not landed yet: keep replaying what came before it.
            Some(resume) => self.cursor.map_or(0, |i| (i + 1) % resume.max(1)),
            None => {
                let next = self.cursor.map_or(0, |i| i + 1);
                if next < len {
                    next
                } else if self.is_growing() {
                    log::debug!("Growth outstanding; wrapping over {} items", len);
                    self.resume_at = Some(len);
                    0
                } else if self.catalog_exhausted {
                    log::debug!("Catalog exhausted; replaying from the start");
                    0
                } else {
                    self.start_growth();
                    self.resume_at = Some(len);
                    0
                }
            }
        };

        let item = self.serve(index).await;
        self.maybe_prefetch();
        self.settle();
        Some(item)
    }

    /// Serve the previous item, wrapping to the last one. Never samples.
    ///
    /// A pending jump to a new batch survives the step back.
    pub async fn retreat(&mut self) -> Option<Item> {
        if self.items.is_empty() {
            return None;
        }
        let index = match self.cursor {
            None | Some(0) => self.items.len() - 1,
            Some(i) => i - 1,
        };
        let item = self.serve(index).await;
        self.settle();
        Some(item)
    }

    /// Drop every queued item and start over. Any in-flight batch is
    /// discarded when it arrives.
    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = None;
        self.resume_at = None;
        self.generation += 1;
        self.catalog_exhausted = self.discoverer_lost;
        self.growth_wanted = false;
        match self.discoverer.as_mut() {
            Some(d) => d.reset_run(),
            None => self.reset_on_return = true,
        }
        log::info!("Queue cleared (generation {})", self.generation);
        self.settle();
    }

    /// Apply one event. Returns the item served, if any.
    pub async fn handle_event(&mut self, event: QueueEvent) -> Option<Item> {
        log::trace!("Queue event: {:?}", event);
        match event {
            QueueEvent::ItemEnded | QueueEvent::Skip => self.advance().await,
            QueueEvent::Previous => self.retreat().await,
            QueueEvent::GrowthCompleted {
                generation,
                result,
                discoverer,
            } => {
                if let Err(e) = self.apply_growth(generation, result, *discoverer) {
                    log::debug!("Background growth ended without items: {}", e);
                }
                None
            }
            QueueEvent::Clear => {
                self.clear();
                None
            }
            QueueEvent::Shutdown => None,
        }
    }

    /// Next event, deferred ones first.
    pub async fn next_event(&mut self) -> Option<QueueEvent> {
        if let Some(event) = self.deferred.pop_front() {
            return Some(event);
        }
        self.events_rx.recv().await
    }

    /// Event loop: every served item is forwarded to `served` until
    /// `Shutdown` arrives or the receiver goes away.
    pub async fn run(&mut self, served: mpsc::UnboundedSender<Item>) {
        while let Some(event) = self.next_event().await {
            if matches!(event, QueueEvent::Shutdown) {
                log::info!("Queue manager shutting down");
                break;
            }
            if let Some(item) = self.handle_event(event).await {
                if served.send(item).is_err() {
                    break;
                }
            }
        }
    }

    /// Process growth completions until the discoverer is back or its task
    /// has died. Other events are kept for later.
    pub async fn wait_for_growth(&mut self) {
        while self.is_growing() {
            let wake = match self.growth_task.as_mut() {
                Some(task) => tokio::select! {
                    biased;
                    event = self.events_rx.recv() => Wake::Event(event),
                    joined = task => Wake::Joined(joined),
                },
                None => Wake::Event(self.events_rx.recv().await),
            };
            match wake {
                Wake::Event(Some(QueueEvent::GrowthCompleted {
                    generation,
                    result,
                    discoverer,
                })) => {
                    if let Err(e) = self.apply_growth(generation, result, *discoverer) {
                        log::debug!("Background growth ended without items: {}", e);
                    }
                }
                Wake::Event(Some(other)) => self.deferred.push_back(other),
                Wake::Event(None) => return,
                // The completion is already queued on the channel.
                Wake::Joined(Ok(())) => self.growth_task = None,
                Wake::Joined(Err(e)) => self.lose_discoverer(e),
            }
        }
    }

    fn lose_discoverer(&mut self, error: JoinError) {
        log::error!("Growth task failed; discovery is no longer available: {}", error);
        self.growth_task = None;
        self.discoverer_lost = true;
        self.catalog_exhausted = true;
        self.growth_wanted = false;
        self.resume_at = None;
        self.pending_consumed.clear();
        self.settle();
    }

    async fn serve(&mut self, index: usize) -> Item {
        self.cursor = Some(index);
        let item = self.items[index].clone();
        match self.discoverer.as_mut() {
            Some(d) => d.record_consumed(&item.id),
            None => self.pending_consumed.push(item.id.clone()),
        }
        if let Err(e) = self.history.record(&item.id).await {
            log::warn!("Failed to record '{}' in history: {}", item.id, e);
        }
        log::debug!("Serving [{}] {} - {}", index, item.primary_contributor(), item.title);
        item
    }

    fn maybe_prefetch(&mut self) {
        if self.catalog_exhausted || self.is_growing() {
            return;
        }
        if self.remaining() < self.config.prefetch_threshold {
            log::debug!("{} items left; prefetching", self.remaining());
            self.start_growth();
        }
    }

    /// Spawn a background discovery run. No-op when one is in flight or
    /// the catalog is exhausted.
    fn start_growth(&mut self) {
        if self.catalog_exhausted {
            return;
        }
        let Some(mut discoverer) = self.discoverer.take() else {
            self.growth_wanted = true;
            return;
        };
        self.growth_wanted = false;

        let generation = self.generation;
        let target = self.config.target_count;
        let policy = self.config.policy;
        let tx = self.events_tx.clone();
        log::info!("Starting background growth of {} items", target);

        self.growth_task = Some(tokio::spawn(async move {
            let result = discoverer.discover(target, policy).await;
            let event = QueueEvent::GrowthCompleted {
                generation,
                result,
                discoverer: Box::new(discoverer),
            };
            if tx.send(event).is_err() {
                log::debug!("Queue manager gone; dropping growth result");
            }
        }));
        self.state = QueueState::Populating;
    }

    fn apply_growth(
        &mut self,
        generation: u64,
        result: Result<Vec<Item>>,
        mut discoverer: Discoverer,
    ) -> Result<usize> {
        for id in self.pending_consumed.drain(..) {
            discoverer.record_consumed(&id);
        }
        if self.reset_on_return {
            discoverer.reset_run();
            self.reset_on_return = false;
        }
        self.discoverer = Some(discoverer);
        self.growth_task = None;

        if generation != self.generation {
            log::debug!("Discarding stale growth from generation {}", generation);
            if self.growth_wanted {
                self.start_growth();
            }
            self.settle();
            return Ok(0);
        }

        let outcome = match result {
            Ok(batch) => {
                let appended = batch.len();
                self.items.extend(batch);
                log::info!("Queue grew by {} to {} items", appended, self.items.len());
                Ok(appended)
            }
            Err(e) => {
                if e.is_empty_result() {
                    self.catalog_exhausted = true;
                    log::warn!("Catalog exhausted for current constraints: {}", e);
                } else {
                    log::warn!("Queue growth failed: {}", e);
                }
                self.resume_at = None;
                Err(e)
            }
        };
        self.settle();
        outcome
    }

    fn settle(&mut self) {
        self.state = if self.is_growing() {
            QueueState::Populating
        } else if self.items.is_empty() {
            if self.catalog_exhausted {
                QueueState::Exhausted
            } else {
                QueueState::Empty
            }
        } else if self.remaining() == 0 {
            QueueState::Exhausted
        } else {
            QueueState::Ready
        };
    }
}
