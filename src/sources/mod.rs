//! Upstream data source implementations

pub mod blockchain;
pub mod coingecko;
pub mod cryptocompare;
pub mod etherscan;
pub mod fear_greed;

pub use blockchain::BlockHeightHalving;
pub use coingecko::{CoinGeckoGlobal, CoinGeckoTrending};
pub use cryptocompare::{CryptoCompareHistory, CryptoCompareNews, CryptoComparePrices};
pub use etherscan::EtherscanGasOracle;
pub use fear_greed::FearGreedSource;

use crate::{constants::USER_AGENT, error::SourceError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest response excerpt carried in error messages
const ERROR_EXCERPT_CHARS: usize = 200;

/// Builds the HTTP client shared by every source
pub fn build_client(timeout: Duration) -> Result<Client, SourceError> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Issues a GET and returns the body of a successful response
pub(crate) async fn get_text(client: &Client, url: &str) -> Result<String, SourceError> {
    tracing::debug!(url, "Fetching upstream feed");

    let response = client.get(url).send().await?;

    if response.status().as_u16() == 429 {
        return Err(SourceError::RateLimited);
    }

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Http {
            status,
            body: excerpt(&body),
        });
    }

    Ok(response.text().await?)
}

/// Deserializes a body, reporting a short excerpt on failure
pub(crate) fn parse_json<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, SourceError> {
    serde_json::from_str(body).map_err(|e| {
        SourceError::parse(format!(
            "Failed to parse {} response: {}. Response: {}",
            what,
            e,
            excerpt(body)
        ))
    })
}

/// Parses a string-encoded number field
pub(crate) fn parse_number<T: std::str::FromStr>(raw: &str, field: &str) -> Result<T, SourceError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| SourceError::parse(format!("Field {} is not a number: {:?}", field, raw)))
}

fn excerpt(body: &str) -> String {
    if body.chars().count() <= ERROR_EXCERPT_CHARS {
        body.to_string()
    } else {
        let cut: String = body.chars().take(ERROR_EXCERPT_CHARS).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client() -> Client {
        build_client(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_text_returns_success_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/ok");
                then.status(200).body("850000");
            })
            .await;

        let body = get_text(&client(), &server.url("/ok")).await.unwrap();

        assert_eq!(body, "850000");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_text_maps_429_to_rate_limited() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/limited");
                then.status(429).body("slow down");
            })
            .await;

        let err = get_text(&client(), &server.url("/limited")).await.unwrap_err();
        assert!(matches!(err, SourceError::RateLimited));
    }

    #[tokio::test]
    async fn test_get_text_maps_other_statuses_to_http_with_excerpt() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/down");
                then.status(503).body("y".repeat(1000));
            })
            .await;

        let err = get_text(&client(), &server.url("/down")).await.unwrap_err();
        let SourceError::Http { status, body } = err else {
            panic!("expected http error, got {:?}", err);
        };
        assert_eq!(status, 503);
        assert_eq!(body.chars().count(), ERROR_EXCERPT_CHARS + 3);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number::<f64>(" 12.5 ", "x").unwrap(), 12.5);
        assert_eq!(parse_number::<u64>("19000000", "x").unwrap(), 19_000_000);
        assert!(matches!(
            parse_number::<u64>("abc", "LastBlock"),
            Err(SourceError::Parse(msg)) if msg.contains("LastBlock")
        ));
    }

    #[test]
    fn test_parse_json_error_is_truncated() {
        let body = "x".repeat(1000);
        let err = parse_json::<serde_json::Value>(&body, "test").unwrap_err();
        let SourceError::Parse(msg) = err else {
            panic!("expected parse error");
        };
        assert!(msg.starts_with("Failed to parse test response"));
        assert!(msg.len() < 400);
    }
}
