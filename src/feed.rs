//! Observable per-feed state
//!
//! Each scheduler owns one [`FeedStore`]. Consumers read snapshots with
//! [`FeedStore::snapshot`] or follow changes through a watch receiver.

use crate::error::FetchError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;

/// Latest known state of a polled feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedState<T> {
    /// Last successfully fetched value
    pub value: Option<T>,
    /// True only while the very first fetch is outstanding
    pub is_loading: bool,
    /// Error from the most recent fetch, cleared by the next success
    pub error: Option<FetchError>,
    /// Time of the last successful fetch
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for FeedState<T> {
    fn default() -> Self {
        Self {
            value: None,
            is_loading: false,
            error: None,
            last_updated_at: None,
        }
    }
}

impl<T> FeedState<T> {
    /// True until the first fetch has completed, successfully or not
    pub fn is_pristine(&self) -> bool {
        self.last_updated_at.is_none() && self.error.is_none()
    }

    /// Age of the current value, if any
    pub fn age(&self) -> Option<Duration> {
        self.last_updated_at.map(|at| {
            let elapsed = Utc::now().signed_duration_since(at);
            Duration::from_secs(elapsed.num_seconds().max(0) as u64)
        })
    }

    /// Check if the value is older than `threshold_secs` (or absent)
    pub fn is_stale(&self, threshold_secs: u64) -> bool {
        match self.age() {
            Some(age) => age.as_secs() > threshold_secs,
            None => true,
        }
    }
}

/// Single-writer holder for a [`FeedState`] with change notification
pub struct FeedStore<T> {
    tx: watch::Sender<FeedState<T>>,
}

impl<T: Clone> FeedStore<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(FeedState::default());
        Self { tx }
    }

    /// Returns a copy of the current state
    pub fn snapshot(&self) -> FeedState<T> {
        self.tx.borrow().clone()
    }

    /// Subscribes to state changes
    pub fn subscribe(&self) -> watch::Receiver<FeedState<T>> {
        self.tx.subscribe()
    }

    /// Marks a fetch as started
    ///
    /// Only the first fetch of a feed shows a loading state; background
    /// refreshes keep serving the previous value silently.
    pub fn begin_fetch(&self) {
        self.tx.send_if_modified(|state| {
            if state.is_pristine() && !state.is_loading {
                state.is_loading = true;
                true
            } else {
                false
            }
        });
    }

    /// Forces the loading flag, used when the feed's subject changes
    pub fn begin_reload(&self) {
        self.tx.send_modify(|state| state.is_loading = true);
    }

    /// Replaces the value after a successful fetch
    pub fn apply_success(&self, value: T, at: DateTime<Utc>) {
        self.tx.send_modify(|state| {
            state.value = Some(value);
            state.error = None;
            state.last_updated_at = Some(at);
            state.is_loading = false;
        });
    }

    /// Records a failed fetch, keeping the previous value
    pub fn apply_failure(&self, error: FetchError) {
        self.tx.send_modify(|state| {
            state.error = Some(error);
            state.is_loading = false;
        });
    }
}

impl<T: Clone> Default for FeedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
