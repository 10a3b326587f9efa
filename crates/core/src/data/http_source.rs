//! Market data source over a JSON HTTP API.
//!
//! # Endpoints
//!
//! Relative to the configured base URL:
//!
//! - `trading-day` → `{"day": "2024-03-01"}`
//! - `indexes/{ticker}?from=&till=` → `[PriceRow]`
//! - `securities` → `[Security]`
//! - `quotes/{ticker}?from=&till=` → `[PriceRow]`
//! - `dividends/{ticker}` → `[DividendRow]`

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::data_model::{DividendRow, PriceRow, Security};
use super::data_traits::MarketDataSourceTrait;
use crate::errors::{AdapterError, Result};

#[derive(Debug, Deserialize)]
struct TradingDayResponse {
    day: NaiveDate,
}

pub struct HttpMarketDataSource {
    client: Client,
    base_url: Url,
}

impl HttpMarketDataSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| AdapterError::Http(format!("invalid base url {base_url}: {e}")))?;
        // Url::join drops the last segment unless the path ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str, range: Option<(NaiveDate, NaiveDate)>) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| AdapterError::Http(format!("invalid endpoint {path}: {e}")))?;
        if let Some((from, till)) = range {
            url.query_pairs_mut()
                .append_pair("from", &from.to_string())
                .append_pair("till", &till.to_string());
        }
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(
                AdapterError::Http(format!("{} returned {}", url, response.status())).into(),
            );
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MarketDataSourceTrait for HttpMarketDataSource {
    async fn last_trading_day(&self) -> Result<NaiveDate> {
        let response: TradingDayResponse = self.fetch(self.endpoint("trading-day", None)?).await?;
        Ok(response.day)
    }

    async fn index_history(
        &self,
        ticker: &str,
        from: NaiveDate,
        till: NaiveDate,
    ) -> Result<Vec<PriceRow>> {
        let url = self.endpoint(&format!("indexes/{ticker}"), Some((from, till)))?;
        self.fetch(url).await
    }

    async fn securities(&self) -> Result<Vec<Security>> {
        self.fetch(self.endpoint("securities", None)?).await
    }

    async fn quotes(
        &self,
        ticker: &str,
        from: NaiveDate,
        till: NaiveDate,
    ) -> Result<Vec<PriceRow>> {
        let url = self.endpoint(&format!("quotes/{ticker}"), Some((from, till)))?;
        self.fetch(url).await
    }

    async fn dividends(&self, ticker: &str) -> Result<Vec<DividendRow>> {
        self.fetch(self.endpoint(&format!("dividends/{ticker}"), None)?)
            .await
    }
}
