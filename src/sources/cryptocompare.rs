//! CryptoCompare sources: spot prices, price history and news

use crate::{
    chart::HistorySource,
    constants::{
        BID_ASK_SPREAD, CRYPTOCOMPARE_API_URL, CRYPTOCOMPARE_NEWS_ENDPOINT,
        CRYPTOCOMPARE_PRICE_ENDPOINT, NEWS_LIMIT, TRACKED_COINS,
    },
    error::SourceError,
    source::DataSource,
    sources::{get_text, parse_json},
    types::{Coin, Granularity, NewsItem, PriceHistory, PriceSnapshot, TimeRange},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;

/// Parses a CryptoCompare body, surfacing errors reported inside a 200 response
///
/// Error payloads (`"Response": "Error"`) do not carry the data shape, so they
/// are detected before the typed parse.
fn parse_checked<T: DeserializeOwned>(body: &str, what: &str, fallback: &str) -> Result<T, SourceError> {
    let envelope: serde_json::Value = parse_json(body, what)?;

    if envelope.get("Response").and_then(|v| v.as_str()) == Some("Error") {
        let msg = envelope
            .get("Message")
            .and_then(|v| v.as_str())
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback);
        return Err(SourceError::upstream(msg));
    }

    serde_json::from_value(envelope)
        .map_err(|e| SourceError::parse(format!("Failed to parse {} response: {}", what, e)))
}

// ---------------------------------------------------------------------------
// Spot prices
// ---------------------------------------------------------------------------

/// pricemultifull response: `RAW.<SYMBOL>.USD`
#[derive(Debug, Deserialize)]
struct PriceMultiFullResponse {
    #[serde(rename = "RAW", default)]
    raw: HashMap<String, HashMap<String, RawMarket>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMarket {
    #[serde(rename = "PRICE")]
    price: f64,
    #[serde(rename = "OPEN24HOUR")]
    open_24h: f64,
    #[serde(rename = "HIGH24HOUR")]
    high_24h: f64,
    #[serde(rename = "LOW24HOUR")]
    low_24h: f64,
    #[serde(rename = "CHANGE24HOUR")]
    change_24h: f64,
    #[serde(rename = "CHANGEPCT24HOUR")]
    change_pct_24h: f64,
    #[serde(rename = "VOLUME24HOURTO")]
    volume_24h_to: f64,
    #[serde(rename = "MKTCAP")]
    market_cap: Option<f64>,
}

impl RawMarket {
    fn into_snapshot(self, coin: Coin) -> PriceSnapshot {
        PriceSnapshot {
            current_price: self.price,
            price_change_24h: self.change_24h,
            price_change_percentage_24h: self.change_pct_24h,
            market_cap: self.market_cap.unwrap_or(0.0),
            total_volume: self.volume_24h_to,
            high_24h: self.high_24h,
            low_24h: self.low_24h,
            open_price: self.open_24h,
            // No order book upstream: bid/ask are approximated around the last price
            bid_price: self.price * (1.0 - BID_ASK_SPREAD),
            ask_price: self.price * (1.0 + BID_ASK_SPREAD),
            trade_count: 0,
            weighted_avg_price: (self.high_24h + self.low_24h + self.price) / 3.0,
            ..PriceSnapshot::empty(coin)
        }
    }
}

/// Normalizes a pricemultifull body into one snapshot per coin, in order
///
/// A coin missing upstream yields a zeroed snapshot with its identity.
pub fn parse_prices(body: &str, coins: &[Coin]) -> Result<Vec<PriceSnapshot>, SourceError> {
    let mut response: PriceMultiFullResponse =
        parse_checked(body, "CryptoCompare price", "Failed to fetch prices")?;

    let snapshots = coins
        .iter()
        .map(|coin| {
            let raw = response
                .raw
                .get_mut(coin.ticker())
                .and_then(|quotes| quotes.remove("USD"));
            match raw {
                Some(raw) => raw.into_snapshot(*coin),
                None => {
                    tracing::debug!(coin = coin.ticker(), "No market data upstream, using zeroed snapshot");
                    PriceSnapshot::empty(*coin)
                }
            }
        })
        .collect();

    Ok(snapshots)
}

/// Batched spot price source for a fixed coin set
pub struct CryptoComparePrices {
    client: Client,
    base_url: String,
    coins: Vec<Coin>,
}

impl CryptoComparePrices {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: CRYPTOCOMPARE_API_URL.to_string(),
            coins: TRACKED_COINS.to_vec(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_coins(mut self, coins: &[Coin]) -> Self {
        self.coins = coins.to_vec();
        self
    }

    fn build_url(&self) -> String {
        let symbols = self
            .coins
            .iter()
            .map(|c| c.ticker())
            .collect::<Vec<_>>()
            .join(",");

        format!(
            "{}{}?fsyms={}&tsyms=USD",
            self.base_url, CRYPTOCOMPARE_PRICE_ENDPOINT, symbols
        )
    }
}

#[async_trait]
impl DataSource for CryptoComparePrices {
    type Output = Vec<PriceSnapshot>;

    async fn fetch(&self) -> Result<Vec<PriceSnapshot>, SourceError> {
        if self.coins.is_empty() {
            return Ok(Vec::new());
        }

        let body = get_text(&self.client, &self.build_url()).await?;
        parse_prices(&body, &self.coins)
    }

    fn source_name(&self) -> &'static str {
        "prices"
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(rename = "Data")]
    data: Option<HistoryData>,
}

/// histo* endpoints nest candles as `Data.Data[]` (v2) or `Data[]` (v1)
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryData {
    Nested {
        #[serde(rename = "Data")]
        data: Vec<Candle>,
    },
    Flat(Vec<Candle>),
}

#[derive(Debug, Deserialize)]
struct Candle {
    time: i64,
    close: f64,
}

/// Normalizes a histohour/histoday body into `(unix_ms, close)` pairs
pub fn parse_history(body: &str) -> Result<PriceHistory, SourceError> {
    let response: HistoryResponse =
        parse_checked(body, "CryptoCompare history", "Failed to fetch price history")?;

    let candles = match response.data {
        Some(HistoryData::Nested { data }) | Some(HistoryData::Flat(data)) => data,
        None => Vec::new(),
    };

    Ok(PriceHistory {
        prices: candles.into_iter().map(|c| (c.time * 1000, c.close)).collect(),
    })
}

/// Historical close prices, one request per (coin, range)
pub struct CryptoCompareHistory {
    client: Client,
    base_url: String,
}

impl CryptoCompareHistory {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: CRYPTOCOMPARE_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_url(&self, coin: Coin, range: TimeRange) -> String {
        let (granularity, limit) = range.sampling();
        let endpoint = match granularity {
            Granularity::Hourly => "histohour",
            Granularity::Daily => "histoday",
        };

        format!(
            "{}/{}?fsym={}&tsym=USD&limit={}",
            self.base_url,
            endpoint,
            coin.ticker(),
            limit
        )
    }
}

#[async_trait]
impl HistorySource for CryptoCompareHistory {
    async fn fetch_history(&self, coin: Coin, range: TimeRange) -> Result<PriceHistory, SourceError> {
        let body = get_text(&self.client, &self.build_url(coin, range)).await?;
        parse_history(&body)
    }
}

// ---------------------------------------------------------------------------
// News
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(rename = "Data")]
    data: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    id: serde_json::Value,
    title: String,
    url: String,
    source: String,
    published_on: i64,
    #[serde(default)]
    imageurl: Option<String>,
}

/// Normalizes a news body into the latest articles
pub fn parse_news(body: &str) -> Result<Vec<NewsItem>, SourceError> {
    let response: NewsResponse =
        parse_checked(body, "CryptoCompare news", "Failed to fetch news")?;

    Ok(response
        .data
        .into_iter()
        .take(NEWS_LIMIT)
        .map(|article| NewsItem {
            id: match article.id {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
            title: article.title,
            url: article.url,
            source: article.source,
            published_at: article.published_on * 1000,
            image_url: article.imageurl.filter(|u| !u.is_empty()),
        })
        .collect())
}

/// Latest English-language news
pub struct CryptoCompareNews {
    client: Client,
    base_url: String,
}

impl CryptoCompareNews {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: CRYPTOCOMPARE_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl DataSource for CryptoCompareNews {
    type Output = Vec<NewsItem>;

    async fn fetch(&self) -> Result<Vec<NewsItem>, SourceError> {
        let url = format!("{}{}", self.base_url, CRYPTOCOMPARE_NEWS_ENDPOINT);
        let body = get_text(&self.client, &url).await?;
        parse_news(&body)
    }

    fn source_name(&self) -> &'static str {
        "news"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICES_BODY: &str = r#"{
        "RAW": {
            "BTC": {"USD": {
                "PRICE": 50000, "OPEN24HOUR": 49000, "HIGH24HOUR": 51000,
                "LOW24HOUR": 48000, "CHANGE24HOUR": 1000, "CHANGEPCT24HOUR": 2.04,
                "VOLUME24HOUR": 1200, "VOLUME24HOURTO": 60000000, "MKTCAP": 980000000000,
                "LASTMARKET": "Coinbase"
            }},
            "ETH": {"USD": {
                "PRICE": 3000, "OPEN24HOUR": 3100, "HIGH24HOUR": 3150,
                "LOW24HOUR": 2950, "CHANGE24HOUR": -100, "CHANGEPCT24HOUR": -3.2,
                "VOLUME24HOURTO": 1000000
            }}
        },
        "DISPLAY": {}
    }"#;

    #[test]
    fn test_parse_prices_keeps_requested_order() {
        let coins = [Coin::ETH, Coin::BTC, Coin::DOT];
        let snapshots = parse_prices(PRICES_BODY, &coins).unwrap();

        let ids: Vec<_> = snapshots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["ethereum", "bitcoin", "polkadot"]);
    }

    #[test]
    fn test_parse_prices_derives_fields() {
        let snapshots = parse_prices(PRICES_BODY, &[Coin::BTC]).unwrap();
        let btc = &snapshots[0];

        assert_eq!(btc.symbol, "btc");
        assert_eq!(btc.name, "Bitcoin");
        assert_eq!(btc.current_price, 50000.0);
        assert_eq!(btc.open_price, 49000.0);
        assert_eq!(btc.total_volume, 60000000.0);
        assert_eq!(btc.market_cap, 980000000000.0);
        assert!((btc.bid_price - 49995.0).abs() < 1e-6);
        assert!((btc.ask_price - 50005.0).abs() < 1e-6);
        assert!((btc.weighted_avg_price - 49666.666_666).abs() < 1e-3);
        assert_eq!(btc.trade_count, 0);
    }

    #[test]
    fn test_parse_prices_missing_market_cap_is_zero() {
        let snapshots = parse_prices(PRICES_BODY, &[Coin::ETH]).unwrap();
        assert_eq!(snapshots[0].market_cap, 0.0);
        assert_eq!(snapshots[0].price_change_24h, -100.0);
    }

    #[test]
    fn test_parse_prices_missing_coin_is_zeroed_with_identity() {
        let snapshots = parse_prices(PRICES_BODY, &[Coin::SOL]).unwrap();
        let sol = &snapshots[0];

        assert_eq!(sol, &PriceSnapshot::empty(Coin::SOL));
        assert_eq!(sol.id, "solana");
        assert_eq!(sol.symbol, "sol");
        assert_eq!(sol.name, "Solana");
        assert_eq!(sol.current_price, 0.0);
    }

    #[test]
    fn test_parse_prices_upstream_error() {
        let body = r#"{"Response":"Error","Message":"You are over your rate limit","Data":{}}"#;
        let err = parse_prices(body, &[Coin::BTC]).unwrap_err();
        assert!(matches!(err, SourceError::Upstream(msg) if msg == "You are over your rate limit"));

        let body = r#"{"Response":"Error"}"#;
        let err = parse_prices(body, &[Coin::BTC]).unwrap_err();
        assert!(matches!(err, SourceError::Upstream(msg) if msg == "Failed to fetch prices"));
    }

    #[test]
    fn test_parse_prices_rejects_garbage() {
        assert!(matches!(
            parse_prices("<html>", &[Coin::BTC]),
            Err(SourceError::Parse(_))
        ));
    }

    #[test]
    fn test_price_url_lists_symbols() {
        let client = Client::new();
        let source = CryptoComparePrices::new(client)
            .with_base_url("http://localhost")
            .with_coins(&[Coin::BTC, Coin::ETH]);
        assert_eq!(
            source.build_url(),
            "http://localhost/pricemultifull?fsyms=BTC,ETH&tsyms=USD"
        );
    }

    #[test]
    fn test_parse_history_nested_and_flat() {
        let nested = r#"{"Response":"Success","Data":{"Aggregated":false,"Data":[
            {"time":1700000000,"close":100.5,"open":99},
            {"time":1700003600,"close":101.0}
        ]}}"#;
        let history = parse_history(nested).unwrap();
        assert_eq!(
            history.prices,
            vec![(1_700_000_000_000, 100.5), (1_700_003_600_000, 101.0)]
        );

        let flat = r#"{"Response":"Success","Data":[{"time":1,"close":2.0}]}"#;
        assert_eq!(parse_history(flat).unwrap().prices, vec![(1000, 2.0)]);

        let empty = r#"{"Response":"Success"}"#;
        assert!(parse_history(empty).unwrap().prices.is_empty());
    }

    #[test]
    fn test_parse_history_upstream_error() {
        let body = r#"{"Response":"Error","Message":"fsym param is invalid","Data":{}}"#;
        assert!(matches!(
            parse_history(body),
            Err(SourceError::Upstream(msg)) if msg == "fsym param is invalid"
        ));
    }

    #[test]
    fn test_history_url_per_range() {
        let source = CryptoCompareHistory::new(Client::new()).with_base_url("http://h");
        assert_eq!(
            source.build_url(Coin::BTC, TimeRange::Day),
            "http://h/histohour?fsym=BTC&tsym=USD&limit=24"
        );
        assert_eq!(
            source.build_url(Coin::SOL, TimeRange::Week),
            "http://h/histohour?fsym=SOL&tsym=USD&limit=168"
        );
        assert_eq!(
            source.build_url(Coin::ETH, TimeRange::Year),
            "http://h/histoday?fsym=ETH&tsym=USD&limit=365"
        );
    }

    #[test]
    fn test_parse_news_takes_latest_ten() {
        let articles: Vec<String> = (0..15)
            .map(|i| {
                format!(
                    r#"{{"id":"{}","title":"t{}","url":"https://n/{}","source":"s","published_on":{},"imageurl":""}}"#,
                    i,
                    i,
                    i,
                    1_700_000_000 + i
                )
            })
            .collect();
        let body = format!(r#"{{"Type":100,"Message":"News list successfully returned","Data":[{}]}}"#, articles.join(","));

        let news = parse_news(&body).unwrap();
        assert_eq!(news.len(), 10);
        assert_eq!(news[0].id, "0");
        assert_eq!(news[0].published_at, 1_700_000_000_000);
        assert_eq!(news[0].image_url, None);
        assert_eq!(news[9].title, "t9");
    }

    #[test]
    fn test_parse_news_numeric_id_and_error() {
        let body = r#"{"Data":[{"id":42,"title":"a","url":"u","source":"s","published_on":1,"imageurl":"https://img"}]}"#;
        let news = parse_news(body).unwrap();
        assert_eq!(news[0].id, "42");
        assert_eq!(news[0].image_url.as_deref(), Some("https://img"));

        let body = r#"{"Response":"Error","Message":"bad lang"}"#;
        assert!(matches!(parse_news(body), Err(SourceError::Upstream(_))));
    }
}
