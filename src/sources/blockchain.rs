//! Bitcoin block height source for the halving estimate

use crate::{
    constants::BLOCK_HEIGHT_URL,
    error::SourceError,
    source::DataSource,
    sources::{get_text, parse_number},
    types::HalvingData,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;

/// Parses the plain-text block height
pub fn parse_block_height(body: &str) -> Result<u64, SourceError> {
    parse_number(body, "block height")
}

/// Halving countdown computed from the current chain height
pub struct BlockHeightHalving {
    client: Client,
    url: String,
}

impl BlockHeightHalving {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: BLOCK_HEIGHT_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl DataSource for BlockHeightHalving {
    type Output = HalvingData;

    async fn fetch(&self) -> Result<HalvingData, SourceError> {
        let body = get_text(&self.client, &self.url).await?;
        let current_block = parse_block_height(&body)?;
        Ok(HalvingData::from_block(current_block, Utc::now()))
    }

    fn source_name(&self) -> &'static str {
        "halving"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block_height() {
        assert_eq!(parse_block_height("850000\n").unwrap(), 850_000);
        assert!(matches!(
            parse_block_height("<html>busy</html>"),
            Err(SourceError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_against_server() {
        use httpmock::prelude::*;

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/q/getblockcount");
                then.status(200).body("850000");
            })
            .await;

        let client = crate::sources::build_client(std::time::Duration::from_secs(5)).unwrap();
        let source = BlockHeightHalving::new(client).with_url(server.url("/q/getblockcount"));
        let halving = source.fetch().await.unwrap();

        assert_eq!(halving.current_block, 850_000);
        assert_eq!(halving.blocks_remaining, 200_000);
    }
}
