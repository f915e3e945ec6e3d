//! Dashboard service
//!
//! Wires every feed to its scheduler, connects the price feed to the alert
//! engine and applies the user's refresh interval.

use crate::{
    alerts::{AlertEngine, FileStore, KeyValueStore},
    chart::ChartFeed,
    constants::{
        FEAR_GREED_CADENCE_SECS, GAS_CADENCE_SECS, HALVING_CADENCE_SECS, REQUEST_TIMEOUT_SECS,
        TRENDING_CADENCE_SECS,
    },
    error::SourceError,
    feed::FeedState,
    metrics::FeedMetrics,
    scheduler::{CycleOutcome, FeedScheduler, SchedulerOptions},
    source::DataSource,
    sources::{
        build_client, BlockHeightHalving, CoinGeckoGlobal, CoinGeckoTrending,
        CryptoCompareHistory, CryptoCompareNews, CryptoComparePrices, EtherscanGasOracle,
        FearGreedSource,
    },
    types::{ComponentHealth, HealthStatus, PriceSnapshot, RefreshInterval},
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Environment variable overriding the price/news/global refresh interval
pub const REFRESH_INTERVAL_ENV: &str = "DASHBOARD_REFRESH_INTERVAL_SECS";

/// Environment variable overriding where alert rules are stored
pub const STORAGE_DIR_ENV: &str = "DASHBOARD_STORAGE_DIR";

/// Runtime configuration for a [`Dashboard`]
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Shared cadence of the price, news and global feeds
    pub refresh_interval: RefreshInterval,
    /// Directory holding the persisted alert rules
    pub storage_dir: PathBuf,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval: RefreshInterval::default(),
            storage_dir: PathBuf::from(".crypto-dashboard"),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl DashboardConfig {
    /// Reads overrides from the environment on top of the defaults
    ///
    /// An interval that is not one of the selectable options is ignored.
    pub fn from_env() -> Self {
        let refresh = std::env::var(REFRESH_INTERVAL_ENV).ok();
        let storage = std::env::var(STORAGE_DIR_ENV).ok();
        Self::from_vars(refresh.as_deref(), storage.as_deref())
    }

    fn from_vars(refresh_secs: Option<&str>, storage_dir: Option<&str>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = refresh_secs {
            match raw.trim().parse().ok().and_then(RefreshInterval::from_secs) {
                Some(interval) => config.refresh_interval = interval,
                None => tracing::warn!(
                    value = raw,
                    "Unsupported {}, using default",
                    REFRESH_INTERVAL_ENV
                ),
            }
        }

        if let Some(dir) = storage_dir.filter(|d| !d.trim().is_empty()) {
            config.storage_dir = PathBuf::from(dir);
        }

        config
    }
}

/// Every feed of the dashboard, polled in the background
///
/// # Example
/// ```no_run
/// use crypto_dashboard_sdk::{Dashboard, DashboardConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let dashboard = Dashboard::new(DashboardConfig::from_env())?;
/// dashboard.start();
///
/// let mut prices = dashboard.prices().subscribe();
/// prices.changed().await?;
/// for coin in prices.borrow().value.iter().flatten() {
///     println!("{}: ${:.2}", coin.symbol, coin.current_price);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Dashboard {
    prices: FeedScheduler<CryptoComparePrices>,
    news: FeedScheduler<CryptoCompareNews>,
    global: FeedScheduler<CoinGeckoGlobal>,
    fear_greed: FeedScheduler<FearGreedSource>,
    trending: FeedScheduler<CoinGeckoTrending>,
    gas: FeedScheduler<EtherscanGasOracle>,
    halving: FeedScheduler<BlockHeightHalving>,
    chart: Arc<ChartFeed>,
    alerts: Arc<AlertEngine>,
    refresh_interval: Mutex<RefreshInterval>,
    alert_task: Mutex<Option<JoinHandle<()>>>,
}

impl Dashboard {
    /// Creates a stopped dashboard with file-backed alert rules
    pub fn new(config: DashboardConfig) -> Result<Self, SourceError> {
        let store = Arc::new(FileStore::new(config.storage_dir.clone()));
        Self::with_store(config, store)
    }

    /// Creates a stopped dashboard persisting alert rules to `store`
    pub fn with_store(
        config: DashboardConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, SourceError> {
        let client = build_client(config.request_timeout)?;
        let user = SchedulerOptions::every(config.refresh_interval.as_duration());

        Ok(Self {
            prices: FeedScheduler::new(CryptoComparePrices::new(client.clone()), user),
            news: FeedScheduler::new(CryptoCompareNews::new(client.clone()), user),
            global: FeedScheduler::new(CoinGeckoGlobal::new(client.clone()), user),
            fear_greed: FeedScheduler::new(
                FearGreedSource::new(client.clone()),
                SchedulerOptions::every(Duration::from_secs(FEAR_GREED_CADENCE_SECS)),
            ),
            trending: FeedScheduler::new(
                CoinGeckoTrending::new(client.clone()),
                SchedulerOptions::every(Duration::from_secs(TRENDING_CADENCE_SECS)),
            ),
            gas: FeedScheduler::new(
                EtherscanGasOracle::new(client.clone()),
                SchedulerOptions::every(Duration::from_secs(GAS_CADENCE_SECS)),
            ),
            halving: FeedScheduler::new(
                BlockHeightHalving::new(client.clone()),
                SchedulerOptions::every(Duration::from_secs(HALVING_CADENCE_SECS)),
            ),
            chart: Arc::new(ChartFeed::new(Arc::new(CryptoCompareHistory::new(client)))),
            alerts: Arc::new(AlertEngine::load(store)),
            refresh_interval: Mutex::new(config.refresh_interval),
            alert_task: Mutex::new(None),
        })
    }

    /// Starts every feed and the alert evaluation task
    ///
    /// Calling it again restarts the schedules from now. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) {
        self.prices.start();
        self.news.start();
        self.global.start();
        self.fear_greed.start();
        self.trending.start();
        self.gas.start();
        self.halving.start();

        let task = spawn_alert_task(self.prices.subscribe(), self.alerts.clone());
        if let Some(old) = lock(&self.alert_task).replace(task) {
            old.abort();
        }

        let chart = self.chart.clone();
        tokio::spawn(async move {
            chart.reload().await;
        });

        tracing::info!(
            refresh_interval = self.refresh_interval().label(),
            "Dashboard started"
        );
    }

    /// Stops every timer; fetches already in flight still land
    pub fn stop(&self) {
        self.prices.stop();
        self.news.stop();
        self.global.stop();
        self.fear_greed.stop();
        self.trending.stop();
        self.gas.stop();
        self.halving.stop();

        if let Some(task) = lock(&self.alert_task).take() {
            task.abort();
        }
        tracing::info!("Dashboard stopped");
    }

    /// Retimes the price, news and global feeds together
    pub fn set_refresh_interval(&self, interval: RefreshInterval) {
        *lock(&self.refresh_interval) = interval;

        let cadence = interval.as_duration();
        self.prices.set_cadence(cadence);
        self.news.set_cadence(cadence);
        self.global.set_cadence(cadence);

        tracing::info!(refresh_interval = interval.label(), "Refresh interval changed");
    }

    pub fn refresh_interval(&self) -> RefreshInterval {
        *lock(&self.refresh_interval)
    }

    /// Refreshes spot prices immediately
    pub async fn refresh_now(&self) -> CycleOutcome {
        self.prices.refresh_now().await
    }

    /// Refreshes every feed concurrently
    pub async fn refresh_all(&self) -> Vec<(&'static str, CycleOutcome)> {
        let (prices, news, global, fear_greed, trending, gas, halving) = futures::join!(
            self.prices.refresh_now(),
            self.news.refresh_now(),
            self.global.refresh_now(),
            self.fear_greed.refresh_now(),
            self.trending.refresh_now(),
            self.gas.refresh_now(),
            self.halving.refresh_now(),
        );

        vec![
            (self.prices.name(), prices),
            (self.news.name(), news),
            (self.global.name(), global),
            (self.fear_greed.name(), fear_greed),
            (self.trending.name(), trending),
            (self.gas.name(), gas),
            (self.halving.name(), halving),
        ]
    }

    /// Fetch metrics for every polled feed
    pub async fn feed_metrics(&self) -> Vec<FeedMetrics> {
        let (prices, news, global, fear_greed, trending, gas, halving) = futures::join!(
            self.prices.metrics(),
            self.news.metrics(),
            self.global.metrics(),
            self.fear_greed.metrics(),
            self.trending.metrics(),
            self.gas.metrics(),
            self.halving.metrics(),
        );
        vec![prices, news, global, fear_greed, trending, gas, halving]
    }

    /// Perform a health check across every feed
    ///
    /// # Returns
    /// Unhealthy without spot prices, Degraded while any feed is failing or
    /// has gone two cadences without a refresh, Healthy otherwise
    pub async fn health_check(&self) -> ComponentHealth {
        let feeds = vec![
            FeedHealth::of(&self.prices),
            FeedHealth::of(&self.news),
            FeedHealth::of(&self.global),
            FeedHealth::of(&self.fear_greed),
            FeedHealth::of(&self.trending),
            FeedHealth::of(&self.gas),
            FeedHealth::of(&self.halving),
        ];
        let metrics = self.feed_metrics().await;

        let mut health = assess(&feeds);
        for m in metrics {
            if let Some(serde_json::Value::Object(detail)) = health.details.get_mut(&m.feed_name) {
                detail.insert("success_rate".to_string(), serde_json::json!(m.success_rate));
                detail.insert("latency_p50_ms".to_string(), serde_json::json!(m.latency_p50_ms));
            }
        }
        health.details.insert(
            "alert_rules".to_string(),
            serde_json::json!(self.alerts.rules().len()),
        );
        health
    }

    pub fn prices(&self) -> &FeedScheduler<CryptoComparePrices> {
        &self.prices
    }

    pub fn news(&self) -> &FeedScheduler<CryptoCompareNews> {
        &self.news
    }

    pub fn global(&self) -> &FeedScheduler<CoinGeckoGlobal> {
        &self.global
    }

    pub fn fear_greed(&self) -> &FeedScheduler<FearGreedSource> {
        &self.fear_greed
    }

    pub fn trending(&self) -> &FeedScheduler<CoinGeckoTrending> {
        &self.trending
    }

    pub fn gas(&self) -> &FeedScheduler<EtherscanGasOracle> {
        &self.gas
    }

    pub fn halving(&self) -> &FeedScheduler<BlockHeightHalving> {
        &self.halving
    }

    pub fn chart(&self) -> &ChartFeed {
        &self.chart
    }

    pub fn alerts(&self) -> &Arc<AlertEngine> {
        &self.alerts
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.alert_task).take() {
            task.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Evaluates alert rules once per successful price poll
///
/// Failed polls leave `last_updated_at` untouched and so never trigger an
/// evaluation.
fn spawn_alert_task(
    mut prices: watch::Receiver<FeedState<Vec<PriceSnapshot>>>,
    engine: Arc<AlertEngine>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_seen = None;
        loop {
            let snapshot = {
                let state = prices.borrow_and_update();
                if state.last_updated_at == last_seen {
                    None
                } else {
                    last_seen = state.last_updated_at;
                    state.value.clone()
                }
            };

            if let Some(snapshot) = snapshot {
                engine.evaluate(&snapshot);
            }

            if prices.changed().await.is_err() {
                break;
            }
        }
    })
}

/// Point-in-time view of one feed for health reporting
#[derive(Debug, Clone)]
struct FeedHealth {
    name: &'static str,
    has_value: bool,
    error: Option<String>,
    last_updated_at: Option<chrono::DateTime<chrono::Utc>>,
    age_secs: Option<u64>,
    /// Value outlived two cadences without a successful refresh
    stale: bool,
}

impl FeedHealth {
    fn of<S: DataSource>(scheduler: &FeedScheduler<S>) -> Self {
        Self::from_state(scheduler.name(), &scheduler.state(), scheduler.cadence())
    }

    fn from_state<T>(name: &'static str, state: &FeedState<T>, cadence: Duration) -> Self {
        let has_value = state.value.is_some();
        Self {
            name,
            has_value,
            error: state.error.as_ref().map(|e| e.message.clone()),
            last_updated_at: state.last_updated_at,
            age_secs: state.age().map(|age| age.as_secs()),
            stale: has_value && state.is_stale(cadence.as_secs().saturating_mul(2)),
        }
    }
}

fn assess(feeds: &[FeedHealth]) -> ComponentHealth {
    let mut details = HashMap::new();
    for feed in feeds {
        details.insert(
            feed.name.to_string(),
            serde_json::json!({
                "has_value": feed.has_value,
                "error": feed.error,
                "last_updated_at": feed.last_updated_at,
                "age_secs": feed.age_secs,
                "stale": feed.stale,
            }),
        );
    }

    let prices_ok = feeds.iter().any(|f| f.name == "prices" && f.has_value);
    let failing: Vec<&str> = feeds
        .iter()
        .filter(|f| f.error.is_some())
        .map(|f| f.name)
        .collect();
    let stale: Vec<&str> = feeds.iter().filter(|f| f.stale).map(|f| f.name).collect();

    let status = if !prices_ok {
        HealthStatus::Unhealthy
    } else if !failing.is_empty() || !stale.is_empty() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let message = match status {
        HealthStatus::Healthy => "Dashboard is serving fresh data".to_string(),
        HealthStatus::Degraded => {
            let mut problems = Vec::new();
            if !failing.is_empty() {
                problems.push(format!("failing: {}", failing.join(", ")));
            }
            if !stale.is_empty() {
                problems.push(format!("stale: {}", stale.join(", ")));
            }
            format!("Dashboard feeds {}", problems.join("; "))
        }
        HealthStatus::Unhealthy => "Dashboard has no price data".to_string(),
    };

    ComponentHealth {
        name: "crypto_dashboard".to_string(),
        status,
        message: Some(message),
        details,
        last_checked: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertCondition, MemoryStore};
    use crate::error::{FetchError, FetchErrorKind};
    use crate::feed::FeedStore;
    use crate::types::Coin;
    use chrono::Utc;

    fn feed(name: &'static str, has_value: bool, error: Option<&str>) -> FeedHealth {
        FeedHealth {
            name,
            has_value,
            error: error.map(str::to_string),
            last_updated_at: has_value.then(Utc::now),
            age_secs: has_value.then_some(0),
            stale: false,
        }
    }

    fn prices(btc: f64) -> Vec<PriceSnapshot> {
        vec![PriceSnapshot {
            current_price: btc,
            ..PriceSnapshot::empty(Coin::BTC)
        }]
    }

    #[test]
    fn test_config_from_vars() {
        let config = DashboardConfig::from_vars(Some("60"), Some("/tmp/alerts"));
        assert_eq!(config.refresh_interval, RefreshInterval::OneMinute);
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/alerts"));

        let config = DashboardConfig::from_vars(Some("45"), Some("  "));
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.refresh_interval, RefreshInterval::FiveMinutes);
    }

    #[test]
    fn test_assess_health() {
        let healthy = assess(&[feed("prices", true, None), feed("news", true, None)]);
        assert_eq!(healthy.status, HealthStatus::Healthy);

        let degraded = assess(&[feed("prices", true, None), feed("gas", true, Some("boom"))]);
        assert_eq!(degraded.status, HealthStatus::Degraded);
        assert_eq!(degraded.message.as_deref(), Some("Dashboard feeds failing: gas"));
        assert_eq!(degraded.details["gas"]["error"], serde_json::json!("boom"));

        let unhealthy = assess(&[feed("prices", false, Some("down")), feed("news", true, None)]);
        assert_eq!(unhealthy.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_old_value_marks_feed_stale() {
        let cadence = Duration::from_secs(300);
        let mut state = FeedState {
            value: Some(1u32),
            is_loading: false,
            error: None,
            last_updated_at: Some(Utc::now() - chrono::Duration::seconds(700)),
        };

        let old = FeedHealth::from_state("news", &state, cadence);
        assert!(old.stale);
        assert!(old.age_secs.unwrap() >= 700);

        let health = assess(&[feed("prices", true, None), old]);
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.message.as_deref(), Some("Dashboard feeds stale: news"));
        assert_eq!(health.details["news"]["stale"], serde_json::json!(true));

        state.last_updated_at = Some(Utc::now() - chrono::Duration::seconds(100));
        assert!(!FeedHealth::from_state("news", &state, cadence).stale);

        // Nothing fetched yet is reported as missing, not stale
        let empty: FeedState<u32> = FeedState::default();
        assert!(!FeedHealth::from_state("news", &empty, cadence).stale);
    }

    /// Lets the spawned alert task drain pending price updates
    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_alert_task_evaluates_on_each_successful_poll() {
        let store = FeedStore::new();
        let engine = Arc::new(AlertEngine::load(Arc::new(MemoryStore::new())));
        engine
            .add_rule("bitcoin", "Bitcoin", 49000.0, AlertCondition::Above)
            .unwrap();
        let mut notifications = engine.subscribe();

        let task = spawn_alert_task(store.subscribe(), engine.clone());
        settle().await;

        let t1 = Utc::now();
        store.apply_success(prices(48000.0), t1);
        settle().await;
        assert!(notifications.try_recv().is_err());
        assert!(!engine.rules()[0].triggered);

        // Satisfied by the 48000 snapshot, but a failed poll must not
        // re-evaluate it
        engine
            .add_rule("bitcoin", "Bitcoin", 49000.0, AlertCondition::Below)
            .unwrap();
        store.apply_failure(FetchError {
            kind: FetchErrorKind::Network,
            message: "Failed to fetch prices: timeout".to_string(),
        });
        settle().await;
        assert!(notifications.try_recv().is_err());
        assert!(engine.rules().iter().all(|r| !r.triggered));

        store.apply_success(prices(50000.0), t1 + chrono::Duration::seconds(1));
        settle().await;

        let notification = notifications.try_recv().unwrap();
        assert_eq!(notification.message, "Bitcoin is now above $49,000");
        assert!(notifications.try_recv().is_err());
        let triggered: Vec<bool> = engine.rules().iter().map(|r| r.triggered).collect();
        assert_eq!(triggered, vec![true, false]);

        task.abort();
    }

    #[tokio::test]
    async fn test_set_refresh_interval_retimes_user_feeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashboardConfig {
            storage_dir: dir.path().to_path_buf(),
            ..DashboardConfig::default()
        };
        let dashboard = Dashboard::new(config).unwrap();
        assert_eq!(
            dashboard.prices().cadence(),
            Duration::from_secs(crate::constants::DEFAULT_REFRESH_INTERVAL_SECS)
        );

        dashboard.set_refresh_interval(RefreshInterval::ThirtySeconds);

        assert_eq!(dashboard.refresh_interval(), RefreshInterval::ThirtySeconds);
        assert_eq!(dashboard.prices().cadence(), Duration::from_secs(30));
        assert_eq!(dashboard.news().cadence(), Duration::from_secs(30));
        assert_eq!(dashboard.global().cadence(), Duration::from_secs(30));
        assert_eq!(dashboard.gas().cadence(), Duration::from_secs(GAS_CADENCE_SECS));
        assert_eq!(
            dashboard.fear_greed().cadence(),
            Duration::from_secs(FEAR_GREED_CADENCE_SECS)
        );
        assert!(!dashboard.prices().is_running());
    }

    #[tokio::test]
    async fn test_health_before_first_poll_is_unhealthy() {
        let dashboard =
            Dashboard::with_store(DashboardConfig::default(), Arc::new(MemoryStore::new()))
                .unwrap();
        dashboard
            .alerts()
            .add_rule("solana", "Solana", 100.0, AlertCondition::Below)
            .unwrap();

        let health = dashboard.health_check().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.details["alert_rules"], serde_json::json!(1));
        assert_eq!(health.details["prices"]["success_rate"], serde_json::json!(1.0));
        assert_eq!(dashboard.feed_metrics().await.len(), 7);
    }
}
