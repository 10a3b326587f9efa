use async_trait::async_trait;
use chrono::NaiveDate;

use super::data_model::{DividendRow, PriceRow, Security};
use crate::errors::Result;

/// Source of exchange data for the daily refresh.
///
/// Date ranges are inclusive on both ends. Rows come back ordered by date.
#[async_trait]
pub trait MarketDataSourceTrait: Send + Sync {
    /// Last trading day whose results are published.
    async fn last_trading_day(&self) -> Result<NaiveDate>;

    async fn index_history(
        &self,
        ticker: &str,
        from: NaiveDate,
        till: NaiveDate,
    ) -> Result<Vec<PriceRow>>;

    async fn securities(&self) -> Result<Vec<Security>>;

    async fn quotes(&self, ticker: &str, from: NaiveDate, till: NaiveDate)
        -> Result<Vec<PriceRow>>;

    /// Full dividend history of a security.
    async fn dividends(&self, ticker: &str) -> Result<Vec<DividendRow>>;
}
