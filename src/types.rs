//! Types for the dashboard feeds

use crate::constants::{
    AVG_BLOCK_TIME_MINUTES, HALVING_INTERVAL_BLOCKS, LAST_HALVING_BLOCK, NEXT_HALVING_BLOCK,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coins tracked by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Coin {
    /// Bitcoin
    BTC,
    /// Ethereum
    ETH,
    /// Solana
    SOL,
    /// Cardano
    ADA,
    /// Polkadot
    DOT,
}

impl Coin {
    /// Get the ticker symbol (upstream casing)
    pub fn ticker(&self) -> &'static str {
        match self {
            Coin::BTC => "BTC",
            Coin::ETH => "ETH",
            Coin::SOL => "SOL",
            Coin::ADA => "ADA",
            Coin::DOT => "DOT",
        }
    }

    /// Get the lowercase display symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Coin::BTC => "btc",
            Coin::ETH => "eth",
            Coin::SOL => "sol",
            Coin::ADA => "ada",
            Coin::DOT => "dot",
        }
    }

    /// Get the coin id used by alert rules and the chart feed
    pub fn id(&self) -> &'static str {
        match self {
            Coin::BTC => "bitcoin",
            Coin::ETH => "ethereum",
            Coin::SOL => "solana",
            Coin::ADA => "cardano",
            Coin::DOT => "polkadot",
        }
    }

    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Coin::BTC => "Bitcoin",
            Coin::ETH => "Ethereum",
            Coin::SOL => "Solana",
            Coin::ADA => "Cardano",
            Coin::DOT => "Polkadot",
        }
    }

    /// Get the small logo URL
    pub fn image(&self) -> &'static str {
        match self {
            Coin::BTC => "https://assets.coingecko.com/coins/images/1/small/bitcoin.png",
            Coin::ETH => "https://assets.coingecko.com/coins/images/279/small/ethereum.png",
            Coin::SOL => "https://assets.coingecko.com/coins/images/4128/small/solana.png",
            Coin::ADA => "https://assets.coingecko.com/coins/images/975/small/cardano.png",
            Coin::DOT => "https://assets.coingecko.com/coins/images/12171/small/polkadot.png",
        }
    }

    /// Get all supported coins
    pub fn all() -> &'static [Coin] {
        &[Coin::BTC, Coin::ETH, Coin::SOL, Coin::ADA, Coin::DOT]
    }

    /// Looks a coin up by its id (`"bitcoin"`, `"solana"`, ...)
    pub fn from_id(id: &str) -> Option<Coin> {
        Self::all().iter().copied().find(|c| c.id() == id)
    }

    /// Case-insensitive search over symbol and name
    pub fn search(query: &str) -> Vec<Coin> {
        let query = query.to_lowercase();
        Self::all()
            .iter()
            .copied()
            .filter(|c| c.symbol().contains(&query) || c.name().to_lowercase().contains(&query))
            .collect()
    }
}

/// User-selectable refresh interval for the price, news and global feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshInterval {
    ThirtySeconds,
    OneMinute,
    TwoMinutes,
    #[default]
    FiveMinutes,
    TenMinutes,
}

impl RefreshInterval {
    pub fn all() -> &'static [RefreshInterval] {
        &[
            RefreshInterval::ThirtySeconds,
            RefreshInterval::OneMinute,
            RefreshInterval::TwoMinutes,
            RefreshInterval::FiveMinutes,
            RefreshInterval::TenMinutes,
        ]
    }

    pub fn as_secs(&self) -> u64 {
        match self {
            RefreshInterval::ThirtySeconds => 30,
            RefreshInterval::OneMinute => 60,
            RefreshInterval::TwoMinutes => 120,
            RefreshInterval::FiveMinutes => 300,
            RefreshInterval::TenMinutes => 600,
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    pub fn label(&self) -> &'static str {
        match self {
            RefreshInterval::ThirtySeconds => "30 seconds",
            RefreshInterval::OneMinute => "1 minute",
            RefreshInterval::TwoMinutes => "2 minutes",
            RefreshInterval::FiveMinutes => "5 minutes",
            RefreshInterval::TenMinutes => "10 minutes",
        }
    }

    /// Maps a number of seconds back onto one of the fixed options
    pub fn from_secs(secs: u64) -> Option<Self> {
        Self::all().iter().copied().find(|i| i.as_secs() == secs)
    }
}

/// Spot market data for one coin
///
/// Produced wholesale by the price source on each poll and superseded by the
/// next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: String,
    pub current_price: f64,
    pub price_change_24h: f64,
    pub price_change_percentage_24h: f64,
    pub market_cap: f64,
    pub total_volume: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub open_price: f64,
    pub bid_price: f64,
    pub ask_price: f64,
    pub trade_count: u64,
    pub weighted_avg_price: f64,
}

impl PriceSnapshot {
    /// All-zero record carrying only the coin's identity
    pub fn empty(coin: Coin) -> Self {
        Self {
            id: coin.id().to_string(),
            symbol: coin.symbol().to_string(),
            name: coin.name().to_string(),
            image: coin.image().to_string(),
            current_price: 0.0,
            price_change_24h: 0.0,
            price_change_percentage_24h: 0.0,
            market_cap: 0.0,
            total_volume: 0.0,
            high_24h: 0.0,
            low_24h: 0.0,
            open_price: 0.0,
            bid_price: 0.0,
            ask_price: 0.0,
            trade_count: 0,
            weighted_avg_price: 0.0,
        }
    }
}

/// Chart range in days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1")]
    Day,
    #[serde(rename = "7")]
    Week,
    #[default]
    #[serde(rename = "30")]
    Month,
    #[serde(rename = "90")]
    Quarter,
    #[serde(rename = "365")]
    Year,
}

/// Sampling granularity of a history request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hourly,
    Daily,
}

impl TimeRange {
    pub fn days(&self) -> u32 {
        match self {
            TimeRange::Day => 1,
            TimeRange::Week => 7,
            TimeRange::Month => 30,
            TimeRange::Quarter => 90,
            TimeRange::Year => 365,
        }
    }

    /// Granularity and sample count requested upstream for this range
    pub fn sampling(&self) -> (Granularity, u32) {
        match self {
            TimeRange::Day => (Granularity::Hourly, 24),
            TimeRange::Week => (Granularity::Hourly, 168),
            TimeRange::Month | TimeRange::Quarter | TimeRange::Year => {
                (Granularity::Daily, self.days())
            }
        }
    }
}

/// Historical close prices as `(unix_ms, close)` pairs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub prices: Vec<(i64, f64)>,
}

/// One news article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub source: String,
    /// Publication time (unix ms)
    pub published_at: i64,
    pub image_url: Option<String>,
}

/// One Fear & Greed index sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearGreedReading {
    pub value: u8,
    pub classification: String,
    /// Sample time (unix ms)
    pub timestamp: i64,
}

/// Latest Fear & Greed reading plus the window it came from, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearGreedHistory {
    pub current: FearGreedReading,
    pub history: Vec<FearGreedReading>,
}

/// Global market totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMarketData {
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub btc_dominance: f64,
    pub eth_dominance: f64,
    pub market_cap_change_24h: f64,
    pub active_cryptocurrencies: u64,
}

/// A coin from the trending list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub thumb: String,
    pub market_cap_rank: Option<u32>,
    pub price_btc: f64,
    pub price_change_24h: f64,
}

/// Ethereum gas oracle reading (Gwei)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasPrice {
    pub safe: f64,
    pub standard: f64,
    pub fast: f64,
    pub base_fee: f64,
    pub last_block: u64,
}

/// Coarse gas price bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasLevel {
    Low,
    Medium,
    High,
}

impl GasPrice {
    pub fn level(gwei: f64) -> GasLevel {
        if gwei < 20.0 {
            GasLevel::Low
        } else if gwei < 50.0 {
            GasLevel::Medium
        } else {
            GasLevel::High
        }
    }
}

/// Bitcoin halving estimate derived from the current block height
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalvingData {
    pub current_block: u64,
    pub halving_block: u64,
    pub blocks_remaining: u64,
    pub estimated_date: DateTime<Utc>,
    pub days_remaining: u64,
    /// Progress since the last halving, clamped to `[0, 100]`
    pub percent_complete: f64,
}

/// Remaining time split the way the countdown widget shows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub years: u64,
    pub months: u64,
    pub days: u64,
}

impl HalvingData {
    /// Computes the estimate for `current_block` as seen at `now`
    ///
    /// Past the halving block the remaining count saturates at zero.
    pub fn from_block(current_block: u64, now: DateTime<Utc>) -> Self {
        let blocks_remaining = NEXT_HALVING_BLOCK.saturating_sub(current_block);
        let minutes_remaining = blocks_remaining * AVG_BLOCK_TIME_MINUTES;
        let estimated_date = now + ChronoDuration::minutes(minutes_remaining as i64);
        let days_remaining = minutes_remaining / (60 * 24);

        let blocks_since_last = current_block as f64 - LAST_HALVING_BLOCK as f64;
        let percent_complete =
            (blocks_since_last / HALVING_INTERVAL_BLOCKS as f64 * 100.0).clamp(0.0, 100.0);

        Self {
            current_block,
            halving_block: NEXT_HALVING_BLOCK,
            blocks_remaining,
            estimated_date,
            days_remaining,
            percent_complete,
        }
    }

    pub fn countdown(&self) -> Countdown {
        Countdown {
            years: self.days_remaining / 365,
            months: (self.days_remaining % 365) / 30,
            days: self.days_remaining % 30,
        }
    }
}

/// Overall system health status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// All feeds are serving fresh data
    Healthy,
    /// At least one feed is in error but data is still available
    Degraded,
    /// Core data (spot prices) is unavailable
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}
