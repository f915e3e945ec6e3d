//! Etherscan gas oracle source

use crate::{
    constants::ETHERSCAN_API_URL,
    error::SourceError,
    source::DataSource,
    sources::{get_text, parse_json, parse_number},
    types::GasPrice,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// On failure `status` is `"0"` and `result` holds an error string
#[derive(Debug, Deserialize)]
struct GasOracleResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawGasOracle {
    last_block: String,
    safe_gas_price: String,
    propose_gas_price: String,
    fast_gas_price: String,
    #[serde(rename = "suggestBaseFee")]
    suggest_base_fee: String,
}

/// Normalizes a gas oracle body; every number arrives string-encoded
pub fn parse_gas_oracle(body: &str) -> Result<GasPrice, SourceError> {
    let response: GasOracleResponse = parse_json(body, "Etherscan gas oracle")?;

    if response.status != "1" {
        let detail = response
            .result
            .as_str()
            .map(str::to_string)
            .or(response.message)
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(SourceError::upstream(format!("Gas price API error: {}", detail)));
    }

    let raw: RawGasOracle = serde_json::from_value(response.result)
        .map_err(|e| SourceError::parse(format!("Unexpected gas oracle result: {}", e)))?;

    Ok(GasPrice {
        safe: parse_number(&raw.safe_gas_price, "SafeGasPrice")?,
        standard: parse_number(&raw.propose_gas_price, "ProposeGasPrice")?,
        fast: parse_number(&raw.fast_gas_price, "FastGasPrice")?,
        base_fee: parse_number(&raw.suggest_base_fee, "suggestBaseFee")?,
        last_block: parse_number(&raw.last_block, "LastBlock")?,
    })
}

/// Ethereum mainnet gas prices
pub struct EtherscanGasOracle {
    client: Client,
    url: String,
}

impl EtherscanGasOracle {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: format!(
                "{}?chainid=1&module=gastracker&action=gasoracle",
                ETHERSCAN_API_URL
            ),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl DataSource for EtherscanGasOracle {
    type Output = GasPrice;

    async fn fetch(&self) -> Result<GasPrice, SourceError> {
        let body = get_text(&self.client, &self.url).await?;
        parse_gas_oracle(&body)
    }

    fn source_name(&self) -> &'static str {
        "gas"
    }
}
