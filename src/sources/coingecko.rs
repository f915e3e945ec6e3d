//! CoinGecko sources: global market totals and trending coins

use crate::{
    constants::{COINGECKO_API_URL, TRENDING_LIMIT},
    error::SourceError,
    source::DataSource,
    sources::{get_text, parse_json},
    types::{GlobalMarketData, TrendingCoin},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

/// CoinGecko error envelope: `{"status": {"error_code": 429, "error_message": "..."}}`
#[derive(Debug, Deserialize)]
struct ErrorStatus {
    error_code: Option<i64>,
    error_message: Option<String>,
}

impl ErrorStatus {
    fn into_error(self) -> Option<SourceError> {
        match (self.error_code, self.error_message) {
            (_, Some(message)) => Some(SourceError::upstream(message)),
            (Some(code), None) => Some(SourceError::upstream(format!("error code {}", code))),
            (None, None) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Global
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: Option<RawGlobal>,
    status: Option<ErrorStatus>,
}

#[derive(Debug, Deserialize)]
struct RawGlobal {
    active_cryptocurrencies: u64,
    total_market_cap: HashMap<String, f64>,
    total_volume: HashMap<String, f64>,
    market_cap_percentage: HashMap<String, f64>,
    market_cap_change_percentage_24h_usd: f64,
}

/// Normalizes a /global body into USD totals and dominance
pub fn parse_global(body: &str) -> Result<GlobalMarketData, SourceError> {
    let response: GlobalResponse = parse_json(body, "CoinGecko global")?;

    if let Some(err) = response.status.and_then(ErrorStatus::into_error) {
        return Err(err);
    }

    let data = response
        .data
        .ok_or_else(|| SourceError::parse("CoinGecko global response has no data"))?;

    let usd = |map: &HashMap<String, f64>, field: &str| {
        map.get("usd")
            .copied()
            .ok_or_else(|| SourceError::parse(format!("CoinGecko global {} has no usd entry", field)))
    };

    Ok(GlobalMarketData {
        total_market_cap: usd(&data.total_market_cap, "total_market_cap")?,
        total_volume_24h: usd(&data.total_volume, "total_volume")?,
        btc_dominance: data.market_cap_percentage.get("btc").copied().unwrap_or(0.0),
        eth_dominance: data.market_cap_percentage.get("eth").copied().unwrap_or(0.0),
        market_cap_change_24h: data.market_cap_change_percentage_24h_usd,
        active_cryptocurrencies: data.active_cryptocurrencies,
    })
}

/// Global market capitalization, volume and dominance
pub struct CoinGeckoGlobal {
    client: Client,
    base_url: String,
}

impl CoinGeckoGlobal {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: COINGECKO_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl DataSource for CoinGeckoGlobal {
    type Output = GlobalMarketData;

    async fn fetch(&self) -> Result<GlobalMarketData, SourceError> {
        let url = format!("{}/global", self.base_url);
        let body = get_text(&self.client, &url).await?;
        parse_global(&body)
    }

    fn source_name(&self) -> &'static str {
        "global"
    }
}

// ---------------------------------------------------------------------------
// Trending
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    #[serde(default)]
    coins: Option<Vec<TrendingEntry>>,
    status: Option<ErrorStatus>,
}

#[derive(Debug, Deserialize)]
struct TrendingEntry {
    item: RawTrendingItem,
}

#[derive(Debug, Deserialize)]
struct RawTrendingItem {
    id: String,
    name: String,
    symbol: String,
    #[serde(default)]
    thumb: String,
    market_cap_rank: Option<u32>,
    #[serde(default)]
    price_btc: f64,
    data: Option<RawTrendingData>,
}

#[derive(Debug, Deserialize)]
struct RawTrendingData {
    price_change_percentage_24h: Option<HashMap<String, f64>>,
}

/// Normalizes a /search/trending body into the top coins
pub fn parse_trending(body: &str) -> Result<Vec<TrendingCoin>, SourceError> {
    let response: TrendingResponse = parse_json(body, "CoinGecko trending")?;

    if let Some(err) = response.status.and_then(ErrorStatus::into_error) {
        return Err(err);
    }

    let coins = response
        .coins
        .ok_or_else(|| SourceError::parse("CoinGecko trending response has no coins"))?;

    Ok(coins
        .into_iter()
        .take(TRENDING_LIMIT)
        .map(|entry| {
            let item = entry.item;
            let price_change_24h = item
                .data
                .and_then(|d| d.price_change_percentage_24h)
                .and_then(|changes| changes.get("usd").copied())
                .unwrap_or(0.0);

            TrendingCoin {
                id: item.id,
                name: item.name,
                symbol: item.symbol,
                thumb: item.thumb,
                market_cap_rank: item.market_cap_rank,
                price_btc: item.price_btc,
                price_change_24h,
            }
        })
        .collect())
}

/// Top searched coins over the last 24 hours
pub struct CoinGeckoTrending {
    client: Client,
    base_url: String,
}

impl CoinGeckoTrending {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: COINGECKO_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl DataSource for CoinGeckoTrending {
    type Output = Vec<TrendingCoin>;

    async fn fetch(&self) -> Result<Vec<TrendingCoin>, SourceError> {
        let url = format!("{}/search/trending", self.base_url);
        let body = get_text(&self.client, &url).await?;
        parse_trending(&body)
    }

    fn source_name(&self) -> &'static str {
        "trending"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global() {
        let body = r#"{"data": {
            "active_cryptocurrencies": 12000,
            "markets": 900,
            "total_market_cap": {"usd": 2500000000000.0, "eur": 2300000000000.0},
            "total_volume": {"usd": 90000000000.0},
            "market_cap_percentage": {"btc": 52.1, "eth": 17.3, "usdt": 4.0},
            "market_cap_change_percentage_24h_usd": -1.25,
            "updated_at": 1700000000
        }}"#;

        let global = parse_global(body).unwrap();
        assert_eq!(global.total_market_cap, 2.5e12);
        assert_eq!(global.total_volume_24h, 9e10);
        assert_eq!(global.btc_dominance, 52.1);
        assert_eq!(global.eth_dominance, 17.3);
        assert_eq!(global.market_cap_change_24h, -1.25);
        assert_eq!(global.active_cryptocurrencies, 12000);
    }

    #[test]
    fn test_parse_global_status_error() {
        let body = r#"{"status": {"error_code": 429, "error_message": "You've exceeded the Rate Limit."}}"#;
        assert!(matches!(
            parse_global(body),
            Err(SourceError::Upstream(msg)) if msg.contains("Rate Limit")
        ));
    }

    #[test]
    fn test_parse_trending_top_seven() {
        let items: Vec<String> = (0..9)
            .map(|i| {
                format!(
                    r#"{{"item": {{"id": "coin-{i}", "name": "Coin {i}", "symbol": "C{i}",
                        "thumb": "https://t/{i}.png", "market_cap_rank": {i}, "price_btc": 0.0001,
                        "data": {{"price_change_percentage_24h": {{"usd": {i}.5}}}}}}}}"#
                )
            })
            .collect();
        let body = format!(r#"{{"coins": [{}], "nfts": []}}"#, items.join(","));

        let trending = parse_trending(&body).unwrap();
        assert_eq!(trending.len(), 7);
        assert_eq!(trending[0].id, "coin-0");
        assert_eq!(trending[3].price_change_24h, 3.5);
        assert_eq!(trending[6].market_cap_rank, Some(6));
    }

    #[test]
    fn test_parse_trending_missing_change_and_rank() {
        let body = r#"{"coins": [{"item": {"id": "x", "name": "X", "symbol": "X",
            "thumb": "", "market_cap_rank": null, "price_btc": 1.0}}]}"#;

        let trending = parse_trending(body).unwrap();
        assert_eq!(trending[0].price_change_24h, 0.0);
        assert_eq!(trending[0].market_cap_rank, None);
    }
}
