//! Constants for the dashboard feeds and alert engine
//!
//! Upstream endpoints, default cadences and the fixed numbers used by the
//! adapters live here. The only runtime knobs are in
//! [`DashboardConfig`](crate::dashboard::DashboardConfig).

use crate::types::Coin;

/// Coins tracked by the spot price feed, in display order
pub const TRACKED_COINS: &[Coin] = &[Coin::BTC, Coin::ETH, Coin::SOL, Coin::ADA, Coin::DOT];

/// HTTP request timeout for every adapter (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// User agent for HTTP requests
pub const USER_AGENT: &str = "crypto-dashboard-sdk/0.1.0";

// ---------------------------------------------------------------------------
// Cadences
// ---------------------------------------------------------------------------

/// Default user refresh interval for prices, news and global stats (in seconds)
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Fear & Greed updates once a day upstream, polled hourly
pub const FEAR_GREED_CADENCE_SECS: u64 = 3600;

/// Trending coins cadence (in seconds)
pub const TRENDING_CADENCE_SECS: u64 = 600;

/// Gas oracle cadence (in seconds)
pub const GAS_CADENCE_SECS: u64 = 15;

/// Block height changes roughly every 10 minutes
pub const HALVING_CADENCE_SECS: u64 = 600;

// ---------------------------------------------------------------------------
// Upstream endpoints
// ---------------------------------------------------------------------------

/// CryptoCompare API base URL
pub const CRYPTOCOMPARE_API_URL: &str = "https://min-api.cryptocompare.com/data";

/// CryptoCompare multi-symbol full price endpoint
pub const CRYPTOCOMPARE_PRICE_ENDPOINT: &str = "/pricemultifull";

/// CryptoCompare news endpoint
pub const CRYPTOCOMPARE_NEWS_ENDPOINT: &str = "/v2/news/?lang=EN";

/// Alternative.me Fear & Greed index URL
pub const FEAR_GREED_API_URL: &str = "https://api.alternative.me/fng/";

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Etherscan v2 API URL
pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Blockchain.info plain-text block height URL
pub const BLOCK_HEIGHT_URL: &str = "https://blockchain.info/q/getblockcount";

// ---------------------------------------------------------------------------
// Adapter parameters
// ---------------------------------------------------------------------------

/// Relative spread used to synthesize bid/ask from the last price
pub const BID_ASK_SPREAD: f64 = 0.0001;

/// Number of news articles kept per poll
pub const NEWS_LIMIT: usize = 10;

/// Number of trending coins kept per poll
pub const TRENDING_LIMIT: usize = 7;

/// Number of daily Fear & Greed samples requested
pub const FEAR_GREED_SAMPLES: usize = 30;

/// Blocks between two halvings
pub const HALVING_INTERVAL_BLOCKS: u64 = 210_000;

/// Block of the most recent halving (April 2024)
pub const LAST_HALVING_BLOCK: u64 = 840_000;

/// Block of the next halving
pub const NEXT_HALVING_BLOCK: u64 = 1_050_000;

/// Average Bitcoin block time (in minutes)
pub const AVG_BLOCK_TIME_MINUTES: u64 = 10;

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Durable key holding the serialized alert rules
pub const ALERTS_STORAGE_KEY: &str = "crypto-tracker-alerts";

/// How long a consumer should display an alert notification (in seconds)
pub const NOTIFICATION_DISPLAY_SECS: u64 = 5;

/// Capacity of the notification broadcast channel
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;
