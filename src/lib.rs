//! # Crypto Dashboard SDK
//!
//! Background data layer for a crypto market dashboard: spot prices, news,
//! global market stats, the Fear & Greed index, trending coins, Ethereum gas
//! and the Bitcoin halving countdown, each polled from a public API on its
//! own cadence, plus user-defined price alerts evaluated on every price poll.
//!
//! ## Usage
//!
//! ```no_run
//! use crypto_dashboard_sdk::{AlertCondition, Dashboard, DashboardConfig, RefreshInterval};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dashboard = Dashboard::new(DashboardConfig::default())?;
//! dashboard.start();
//!
//! // Alerts fire once, on the first price poll that satisfies them
//! dashboard
//!     .alerts()
//!     .add_rule("bitcoin", "Bitcoin", 100_000.0, AlertCondition::Above)?;
//! let mut notifications = dashboard.alerts().subscribe();
//!
//! dashboard.set_refresh_interval(RefreshInterval::OneMinute);
//!
//! let notification = notifications.recv().await?;
//! println!("{}", notification.message);
//! # Ok(())
//! # }
//! ```
//!
//! Every feed keeps serving its last good value when a poll fails; the
//! failure is reported through the feed state's `error` field.

pub mod alerts;
pub mod chart;
pub mod constants;
pub mod dashboard;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod scheduler;
pub mod source;
pub mod sources;
pub mod types;

// Re-export commonly used types
pub use alerts::{AlertCondition, AlertEngine, AlertNotification, AlertRule};
pub use chart::{ChartFeed, HistorySource};
pub use dashboard::{Dashboard, DashboardConfig};
pub use error::{AlertError, FetchError, FetchErrorKind, SourceError, StorageError};
pub use feed::FeedState;
pub use metrics::FeedMetrics;
pub use scheduler::{CycleOutcome, FeedScheduler, SchedulerOptions};
pub use source::DataSource;
pub use types::{
    Coin, ComponentHealth, FearGreedHistory, GasPrice, GlobalMarketData, HalvingData,
    HealthStatus, NewsItem, PriceHistory, PriceSnapshot, RefreshInterval, TimeRange,
    TrendingCoin,
};
