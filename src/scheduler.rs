//! Polling scheduler
//!
//! One [`FeedScheduler`] drives one [`DataSource`] on a cadence and owns the
//! feed's [`FeedStore`].
//!
//! ## Overlapping cycles
//!
//! At most one fetch is in flight per scheduler. A tick (or a manual
//! refresh) that arrives while a fetch is outstanding is skipped, not
//! queued, so a slow upstream never sees more than one request per feed.
//!
//! ```text
//! cadence 1000ms, fetch takes 1500ms
//!
//! t=0     start -> fetch #1 starts
//! t=1000  tick -> busy, skipped
//! t=1500  fetch #1 applied
//! t=2000  tick -> fetch #2 starts
//! ```
//!
//! ## Cancellation
//!
//! [`FeedScheduler::stop`] cancels only the timer; a fetch already in flight
//! still applies its result. Dropping the scheduler tears it down and any
//! in-flight result is discarded.

use crate::{
    error::FetchError,
    feed::{FeedState, FeedStore},
    metrics::{FeedMetrics, MetricsCollector},
    source::DataSource,
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Smallest cadence accepted by the scheduler
const MIN_CADENCE: Duration = Duration::from_millis(1);

/// Construction parameters for a [`FeedScheduler`]
#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// Interval between scheduled fetches
    pub cadence: Duration,
    /// Whether `start()` fetches immediately or waits one cadence
    pub fetch_on_start: bool,
}

impl SchedulerOptions {
    /// Polls every `cadence`, fetching once immediately on start
    pub fn every(cadence: Duration) -> Self {
        Self {
            cadence,
            fetch_on_start: true,
        }
    }
}

/// Result of one fetch cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// New value applied to the feed
    Updated,
    /// Fetch failed; the previous value is still served
    Failed(FetchError),
    /// Another fetch was already in flight
    Skipped,
    /// Scheduler was torn down before the result arrived
    Discarded,
}

struct Shared<S: DataSource> {
    source: S,
    store: FeedStore<S::Output>,
    metrics: MetricsCollector,
    in_flight: AtomicBool,
    torn_down: AtomicBool,
}

/// Holds the feed's single in-flight slot; released on drop
struct InFlight<S: DataSource> {
    shared: Arc<Shared<S>>,
}

impl<S: DataSource> Drop for InFlight<S> {
    fn drop(&mut self) {
        self.shared.in_flight.store(false, Ordering::Release);
    }
}

impl<S: DataSource> Shared<S> {
    fn try_begin(self: &Arc<Self>) -> Option<InFlight<S>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight {
                shared: self.clone(),
            })
    }
}

/// Runs one fetch and applies its result while holding the in-flight slot
async fn run_cycle<S: DataSource>(slot: InFlight<S>) -> CycleOutcome {
    let shared = &slot.shared;
    let feed = shared.source.source_name();

    shared.store.begin_fetch();
    let start = std::time::Instant::now();
    let result = shared.source.fetch().await;
    let elapsed = start.elapsed();

    if shared.torn_down.load(Ordering::Acquire) {
        tracing::debug!(feed, "Scheduler torn down, discarding fetch result");
        return CycleOutcome::Discarded;
    }

    match result {
        Ok(value) => {
            shared.store.apply_success(value, Utc::now());
            shared.metrics.record_fetch(elapsed, true).await;
            tracing::debug!(
                feed,
                latency_ms = elapsed.as_millis() as u64,
                "Feed updated"
            );
            CycleOutcome::Updated
        }
        Err(e) => {
            let error = FetchError::from_source(feed, &e);
            shared.store.apply_failure(error.clone());
            shared.metrics.record_fetch(elapsed, false).await;
            tracing::warn!(feed, error = %e, "Feed fetch failed");
            CycleOutcome::Failed(error)
        }
    }
}

struct TimerState {
    cadence: Duration,
    fetch_on_start: bool,
    handle: Option<JoinHandle<()>>,
}

/// Recurring fetch driver for one feed
///
/// Timer operations spawn onto the ambient tokio runtime and must be called
/// from within one.
pub struct FeedScheduler<S: DataSource> {
    shared: Arc<Shared<S>>,
    timer: Mutex<TimerState>,
}

impl<S: DataSource> FeedScheduler<S> {
    /// Creates a stopped scheduler for `source`
    pub fn new(source: S, options: SchedulerOptions) -> Self {
        let metrics = MetricsCollector::new(source.source_name());
        let shared = Arc::new(Shared {
            source,
            store: FeedStore::new(),
            metrics,
            in_flight: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
        });

        Self {
            shared,
            timer: Mutex::new(TimerState {
                cadence: options.cadence.max(MIN_CADENCE),
                fetch_on_start: options.fetch_on_start,
                handle: None,
            }),
        }
    }

    /// Feed name of the underlying source
    pub fn name(&self) -> &'static str {
        self.shared.source.source_name()
    }

    /// Starts polling, replacing any existing schedule
    pub fn start(&self) {
        let mut timer = self.lock_timer();
        if let Some(handle) = timer.handle.take() {
            handle.abort();
        }

        // The initial fetch runs outside the timer so a cadence change
        // right after start() cannot cancel it
        if timer.fetch_on_start {
            match self.shared.try_begin() {
                Some(slot) => {
                    tokio::spawn(run_cycle(slot));
                }
                None => tracing::debug!(feed = self.name(), "Initial fetch skipped, fetch in flight"),
            }
        }

        let first_tick = Instant::now() + timer.cadence;
        timer.handle = Some(spawn_timer(self.shared.clone(), first_tick, timer.cadence));

        tracing::info!(
            feed = self.name(),
            cadence_ms = timer.cadence.as_millis() as u64,
            "Feed polling started"
        );
    }

    /// Changes the cadence and reschedules without fetching
    ///
    /// Setting the current cadence again leaves the timer untouched.
    pub fn set_cadence(&self, cadence: Duration) {
        if cadence < MIN_CADENCE {
            tracing::warn!(feed = self.name(), "Ignoring zero cadence");
            return;
        }

        let mut timer = self.lock_timer();
        if timer.cadence == cadence {
            return;
        }
        timer.cadence = cadence;

        if let Some(handle) = timer.handle.take() {
            handle.abort();
            timer.handle = Some(spawn_timer(
                self.shared.clone(),
                Instant::now() + cadence,
                cadence,
            ));
        }

        tracing::debug!(
            feed = self.name(),
            cadence_ms = cadence.as_millis() as u64,
            "Feed cadence changed"
        );
    }

    /// Fetches immediately, independent of the timer's phase
    ///
    /// Returns [`CycleOutcome::Skipped`] when a fetch is already in flight.
    pub async fn refresh_now(&self) -> CycleOutcome {
        let Some(slot) = self.shared.try_begin() else {
            tracing::debug!(feed = self.name(), "Refresh skipped, fetch in flight");
            return CycleOutcome::Skipped;
        };

        // Runs detached so the cycle completes even if the caller goes away
        match tokio::spawn(run_cycle(slot)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(feed = self.name(), error = %e, "Refresh task failed");
                CycleOutcome::Discarded
            }
        }
    }

    /// Cancels the pending timer; in-flight fetches still complete
    pub fn stop(&self) {
        if let Some(handle) = self.lock_timer().handle.take() {
            handle.abort();
            tracing::info!(feed = self.name(), "Feed polling stopped");
        }
    }

    /// True while the timer is armed
    pub fn is_running(&self) -> bool {
        self.lock_timer().handle.is_some()
    }

    /// Current interval between scheduled fetches
    pub fn cadence(&self) -> Duration {
        self.lock_timer().cadence
    }

    /// Returns the latest feed state
    pub fn state(&self) -> FeedState<S::Output> {
        self.shared.store.snapshot()
    }

    /// Subscribes to feed state changes
    pub fn subscribe(&self) -> watch::Receiver<FeedState<S::Output>> {
        self.shared.store.subscribe()
    }

    /// Gets fetch latency and success metrics for this feed
    pub async fn metrics(&self) -> FeedMetrics {
        self.shared.metrics.get_metrics().await
    }

    fn lock_timer(&self) -> MutexGuard<'_, TimerState> {
        // The timer state stays consistent even if a holder panicked
        self.timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: DataSource> Drop for FeedScheduler<S> {
    fn drop(&mut self) {
        self.shared.torn_down.store(true, Ordering::Release);
        if let Some(handle) = self.lock_timer().handle.take() {
            handle.abort();
        }
    }
}

fn spawn_timer<S: DataSource>(
    shared: Arc<Shared<S>>,
    first_tick: Instant,
    cadence: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(first_tick, cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match shared.try_begin() {
                Some(slot) => {
                    tokio::spawn(run_cycle(slot));
                }
                None => {
                    tracing::debug!(
                        feed = shared.source.source_name(),
                        "Tick skipped, fetch in flight"
                    );
                    shared.metrics.record_skip().await;
                }
            }
        }
    })
}
