//! Row types and entities of the daily refresh.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::rows::{append_rows, replace_rows, DatedRow};
use crate::errors::Result;
use crate::store::Entity;

/// Daily close of an index or a security.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub close: Decimal,
    pub turnover: Decimal,
}

impl DatedRow for PriceRow {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// One dividend payment per share.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DividendRow {
    pub date: NaiveDate,
    pub dividend: Decimal,
    pub currency: String,
}

impl DatedRow for DividendRow {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// A traded security.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    pub ticker: String,
    pub isin: String,
    pub board: String,
    pub lot: u32,
}

/// Bookkeeping of the refresh cycle.
///
/// The record's day is the last trading day whose refresh completed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingDay {
    pub last_refresh: Option<DateTime<Utc>>,
}

impl Entity for TradingDay {
    const COLLECTION: &'static str = "trading_day";
}

/// Close history of one index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexTable {
    pub rows: Vec<PriceRow>,
}

impl Entity for IndexTable {
    const COLLECTION: &'static str = "indexes";
}

impl IndexTable {
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|row| row.date)
    }

    /// Appends rows newer than the stored ones. Returns how many were added.
    pub fn append(&mut self, update: Vec<PriceRow>) -> Result<usize> {
        append_rows(&mut self.rows, update)
    }
}

/// Securities currently traded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SecuritiesTable {
    pub securities: Vec<Security>,
}

impl Entity for SecuritiesTable {
    const COLLECTION: &'static str = "securities";
}

impl SecuritiesTable {
    pub fn tickers(&self) -> Vec<String> {
        self.securities
            .iter()
            .map(|security| security.ticker.clone())
            .collect()
    }
}

/// Close and turnover history of one security.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotesTable {
    pub rows: Vec<PriceRow>,
}

impl Entity for QuotesTable {
    const COLLECTION: &'static str = "quotes";
}

impl QuotesTable {
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|row| row.date)
    }

    pub fn last_close(&self) -> Option<Decimal> {
        self.rows.last().map(|row| row.close)
    }

    pub fn append(&mut self, update: Vec<PriceRow>) -> Result<usize> {
        append_rows(&mut self.rows, update)
    }
}

/// Dividend history of one security.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DividendsTable {
    pub rows: Vec<DividendRow>,
}

impl Entity for DividendsTable {
    const COLLECTION: &'static str = "dividends";
}

impl DividendsTable {
    /// Replaces the whole history. Returns `true` when it changed.
    pub fn replace(&mut self, rows: Vec<DividendRow>) -> Result<bool> {
        replace_rows(&mut self.rows, rows)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub shares: u64,
    pub price: Decimal,
}

impl Position {
    pub fn value(&self) -> Decimal {
        Decimal::from(self.shares) * self.price
    }
}

/// Cash and positions, valued at the last known closes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: Decimal,
    pub positions: Vec<Position>,
    pub value: Decimal,
}

impl Entity for Portfolio {
    const COLLECTION: &'static str = "portfolio";
}

impl Portfolio {
    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions
            .iter()
            .find(|position| position.ticker == ticker)
    }

    /// Aligns positions with the traded tickers.
    ///
    /// Newly listed tickers get an empty position. Positions no longer traded
    /// are dropped once they hold no shares.
    pub fn sync_tickers(&mut self, tickers: &[String]) {
        self.positions
            .retain(|position| position.shares > 0 || tickers.contains(&position.ticker));
        for ticker in tickers {
            if self.position(ticker).is_none() {
                self.positions.push(Position {
                    ticker: ticker.clone(),
                    shares: 0,
                    price: Decimal::ZERO,
                });
            }
        }
        self.positions.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    }

    /// Reprices positions and returns the new total value.
    ///
    /// Positions without a price in `prices` keep their previous one.
    pub fn revalue(&mut self, prices: &HashMap<String, Decimal>) -> Decimal {
        for position in &mut self.positions {
            if let Some(price) = prices.get(&position.ticker) {
                position.price = *price;
            }
        }
        self.value = self.cash + self.positions.iter().map(Position::value).sum::<Decimal>();
        self.value
    }
}
