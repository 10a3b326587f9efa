use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Asks whether the data source has a trading day newer than the stored one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTradingDay;

/// A trading day ended and its data can be loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTradingDay {
    pub day: NaiveDate,
}

/// Every table was refreshed up to `day`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUpdated {
    pub day: NaiveDate,
}

/// The portfolio was repriced at the close of `day`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRevalued {
    pub day: NaiveDate,
    pub value: Decimal,
}
