//! Alternative.me Fear & Greed index source

use crate::{
    constants::{FEAR_GREED_API_URL, FEAR_GREED_SAMPLES},
    error::SourceError,
    source::DataSource,
    sources::{get_text, parse_json, parse_number},
    types::{FearGreedHistory, FearGreedReading},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<RawReading>,
    #[serde(default)]
    metadata: Option<FngMetadata>,
}

#[derive(Debug, Deserialize)]
struct FngMetadata {
    error: Option<String>,
}

/// Values arrive string-encoded: `{"value": "40", "timestamp": "1551157200"}`
#[derive(Debug, Deserialize)]
struct RawReading {
    value: String,
    value_classification: String,
    timestamp: String,
}

impl RawReading {
    fn normalize(self) -> Result<FearGreedReading, SourceError> {
        let value: u8 = parse_number(&self.value, "value")?;
        let timestamp: i64 = parse_number(&self.timestamp, "timestamp")?;
        Ok(FearGreedReading {
            value,
            classification: self.value_classification,
            timestamp: timestamp * 1000,
        })
    }
}

/// Normalizes an index body; upstream lists the newest reading first
pub fn parse_fear_greed(body: &str) -> Result<FearGreedHistory, SourceError> {
    let response: FngResponse = parse_json(body, "Fear & Greed")?;

    if let Some(error) = response.metadata.and_then(|m| m.error) {
        return Err(SourceError::upstream(error));
    }

    let mut history = response
        .data
        .into_iter()
        .map(RawReading::normalize)
        .collect::<Result<Vec<_>, _>>()?;

    let current = history
        .first()
        .cloned()
        .ok_or_else(|| SourceError::parse("Fear & Greed response has no readings"))?;

    // Oldest first for charting
    history.reverse();

    Ok(FearGreedHistory { current, history })
}

/// Daily sentiment index over a fixed 30-sample window
pub struct FearGreedSource {
    client: Client,
    url: String,
}

impl FearGreedSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: format!("{}?limit={}", FEAR_GREED_API_URL, FEAR_GREED_SAMPLES),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl DataSource for FearGreedSource {
    type Output = FearGreedHistory;

    async fn fetch(&self) -> Result<FearGreedHistory, SourceError> {
        let body = get_text(&self.client, &self.url).await?;
        parse_fear_greed(&body)
    }

    fn source_name(&self) -> &'static str {
        "fear_greed"
    }
}
