//! Price history for the charted coin
//!
//! Unlike the polled feeds, history is fetched on demand whenever the user
//! picks a new (coin, range) pair. Every new selection shows a loading
//! state, and a response for a selection that has since been replaced is
//! dropped so a slow request can never overwrite a newer chart.

use crate::{
    error::{FetchError, SourceError},
    feed::{FeedState, FeedStore},
    types::{Coin, PriceHistory, TimeRange},
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Upstream of historical price series
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetches the sampled series for `coin` over `range`
    async fn fetch_history(&self, coin: Coin, range: TimeRange) -> Result<PriceHistory, SourceError>;
}

/// Chart data holder keyed by the current selection
pub struct ChartFeed {
    source: Arc<dyn HistorySource>,
    store: FeedStore<PriceHistory>,
    generation: AtomicU64,
    selection: Mutex<(Coin, TimeRange)>,
}

impl ChartFeed {
    pub fn new(source: Arc<dyn HistorySource>) -> Self {
        Self {
            source,
            store: FeedStore::new(),
            generation: AtomicU64::new(0),
            selection: Mutex::new((Coin::BTC, TimeRange::default())),
        }
    }

    /// Currently selected coin and range
    pub fn selection(&self) -> (Coin, TimeRange) {
        *self.selection.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Selects a pair and fetches its history
    ///
    /// Returns `true` when the result was applied, `false` when a newer
    /// selection superseded this one before the response arrived.
    pub async fn select(&self, coin: Coin, range: TimeRange) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *self.selection.lock().unwrap_or_else(|p| p.into_inner()) = (coin, range);

        self.store.begin_reload();
        let result = self.source.fetch_history(coin, range).await;

        if self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!(coin = coin.ticker(), days = range.days(), "Dropping superseded chart data");
            return false;
        }

        match result {
            Ok(history) => {
                tracing::debug!(
                    coin = coin.ticker(),
                    days = range.days(),
                    points = history.prices.len(),
                    "Chart data updated"
                );
                self.store.apply_success(history, Utc::now());
            }
            Err(e) => {
                tracing::warn!(coin = coin.ticker(), error = %e, "Chart fetch failed");
                self.store.apply_failure(FetchError::from_source("chart data", &e));
            }
        }
        true
    }

    /// Refetches the current selection
    pub async fn reload(&self) -> bool {
        let (coin, range) = self.selection();
        self.select(coin, range).await
    }

    pub fn state(&self) -> FeedState<PriceHistory> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState<PriceHistory>> {
        self.store.subscribe()
    }
}
