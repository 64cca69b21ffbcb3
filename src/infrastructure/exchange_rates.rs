use crate::domain::ports::ExchangeRateProvider;
use crate::error::RateProviderError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://open.er-api.com/v6/latest/";

/// Payload of `GET {base_url}{BASE}`.
#[derive(Debug, Deserialize)]
struct LatestRates {
    result: String,
    #[serde(default)]
    rates: HashMap<String, Decimal>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

/// Exchange-rate provider backed by an open.er-api.com compatible HTTP API.
#[derive(Clone)]
pub struct HttpRateProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRateProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RateProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ExchangeRateProvider for HttpRateProvider {
    async fn fetch(&self, base: &str) -> Result<HashMap<String, Decimal>, RateProviderError> {
        let url = format!("{}{}", self.base_url, base);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: LatestRates = response
            .json()
            .await
            .map_err(|e| RateProviderError::Malformed(e.to_string()))?;

        if body.result == "error" {
            return Err(RateProviderError::Api(
                body.error_type.unwrap_or_else(|| "unknown".to_string()),
            ));
        }
        Ok(body.rates)
    }
}
