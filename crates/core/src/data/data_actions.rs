//! Nodes of the refresh DAG for one trading day.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};
use rust_decimal::Decimal;

use super::data_model::{DividendsTable, IndexTable, Portfolio, QuotesTable, SecuritiesTable};
use super::data_traits::MarketDataSourceTrait;
use crate::bus::{Backoff, Bus};
use crate::constants::{start_day, INDEX_TICKERS, PORTFOLIO_UID, SECURITIES_UID};
use crate::dag::{Action, Dag};
use crate::errors::{Error, Result};
use crate::store::Record;
use crate::uow::UnitOfWork;
use crate::utils::join_all_errors;

/// Shared parameters of one refresh.
///
/// `tickers` is written only by [`UpdateSecurities`] and `revalued` only by
/// [`UpdatePortfolio`]; every other node reads.
#[derive(Debug)]
pub struct DataUpdateParams {
    day: NaiveDate,
    tickers: Mutex<Vec<String>>,
    revalued: Mutex<Option<Decimal>>,
}

impl DataUpdateParams {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            tickers: Mutex::new(Vec::new()),
            revalued: Mutex::new(None),
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// Tickers of the refreshed securities list.
    pub fn tickers(&self) -> Vec<String> {
        lock(&self.tickers).clone()
    }

    /// Portfolio value computed by the refresh, once it got that far.
    pub fn revalued(&self) -> Option<Decimal> {
        *lock(&self.revalued)
    }

    pub(super) fn set_tickers(&self, tickers: Vec<String>) {
        *lock(&self.tickers) = tickers;
    }

    pub(super) fn set_revalued(&self, value: Decimal) {
        *lock(&self.revalued) = Some(value);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tables already dated after the refresh day are left alone.
fn is_newer<E>(record: &Record<E>, day: NaiveDate) -> bool {
    if record.day() > day {
        debug!("{} is already at {}, skipping {}", record.uid(), record.day(), day);
        return true;
    }
    false
}

/// Builds the DAG refreshing every table for `day`.
///
/// ```text
/// indexes
/// securities ─┬─▶ quotes ────┬─▶ portfolio
///             └─▶ dividends ─┘
/// ```
pub fn build_data_update_dag(
    bus: &Bus,
    source: Arc<dyn MarketDataSourceTrait>,
    day: NaiveDate,
    backoff: Backoff,
) -> Result<Dag<DataUpdateParams>> {
    let dag = Dag::new(bus, DataUpdateParams::new(day)).with_backoff(backoff);
    dag.add_node_with_retry(UpdateIndexes::new(Arc::clone(&source)), &[])?;
    let securities = dag.add_node_with_retry(UpdateSecurities::new(Arc::clone(&source)), &[])?;
    let quotes = dag.add_node_with_retry(UpdateQuotes::new(Arc::clone(&source)), &[securities])?;
    let dividends = dag.add_node_with_retry(UpdateDividends::new(source), &[securities])?;
    dag.add_node_with_retry(UpdatePortfolio, &[quotes, dividends])?;
    Ok(dag)
}

pub struct UpdateIndexes {
    source: Arc<dyn MarketDataSourceTrait>,
}

impl UpdateIndexes {
    pub fn new(source: Arc<dyn MarketDataSourceTrait>) -> Self {
        Self { source }
    }

    async fn update_one(&self, ctx: &UnitOfWork, ticker: &str, day: NaiveDate) -> Result<()> {
        let table = ctx.get_for_update::<IndexTable>(ticker).await?;
        let mut table = table.lock().await;
        if is_newer(&*table, day) {
            return Ok(());
        }
        let from = table.last_date().unwrap_or_else(start_day);
        let rows = self.source.index_history(ticker, from, day).await?;
        let added = table
            .append(rows)
            .map_err(|e| Error::domain(format!("index {ticker}: {e}")))?;
        table.advance_day(day)?;
        debug!("Index {} got {} new row(s)", ticker, added);
        Ok(())
    }
}

#[async_trait]
impl Action<DataUpdateParams> for UpdateIndexes {
    async fn run(&self, ctx: &UnitOfWork, params: &DataUpdateParams) -> Result<()> {
        join_all_errors(
            INDEX_TICKERS
                .iter()
                .map(|ticker| self.update_one(ctx, ticker, params.day())),
        )
        .await
    }
}

pub struct UpdateSecurities {
    source: Arc<dyn MarketDataSourceTrait>,
}

impl UpdateSecurities {
    pub fn new(source: Arc<dyn MarketDataSourceTrait>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Action<DataUpdateParams> for UpdateSecurities {
    async fn run(&self, ctx: &UnitOfWork, params: &DataUpdateParams) -> Result<()> {
        let table = ctx.get_for_update::<SecuritiesTable>(SECURITIES_UID).await?;
        let mut table = table.lock().await;
        if is_newer(&*table, params.day()) {
            params.set_tickers(table.tickers());
            return Ok(());
        }

        let mut securities = self.source.securities().await?;
        if securities.is_empty() {
            return Err(Error::domain("securities list is empty"));
        }
        securities.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        if let Some(pair) = securities.windows(2).find(|pair| pair[0].ticker == pair[1].ticker) {
            return Err(Error::domain(format!(
                "ticker {} is listed twice",
                pair[0].ticker
            )));
        }

        table.securities = securities;
        table.advance_day(params.day())?;
        params.set_tickers(table.tickers());
        info!("Securities list has {} ticker(s)", table.securities.len());
        Ok(())
    }
}

pub struct UpdateQuotes {
    source: Arc<dyn MarketDataSourceTrait>,
}

impl UpdateQuotes {
    pub fn new(source: Arc<dyn MarketDataSourceTrait>) -> Self {
        Self { source }
    }

    async fn update_one(&self, ctx: &UnitOfWork, ticker: &str, day: NaiveDate) -> Result<()> {
        let table = ctx.get_for_update::<QuotesTable>(ticker).await?;
        let mut table = table.lock().await;
        if is_newer(&*table, day) {
            return Ok(());
        }
        let from = table.last_date().unwrap_or_else(start_day);
        let rows = self.source.quotes(ticker, from, day).await?;
        table
            .append(rows)
            .map_err(|e| Error::domain(format!("quotes {ticker}: {e}")))?;
        table.advance_day(day)
    }
}

#[async_trait]
impl Action<DataUpdateParams> for UpdateQuotes {
    async fn run(&self, ctx: &UnitOfWork, params: &DataUpdateParams) -> Result<()> {
        let tickers = params.tickers();
        join_all_errors(
            tickers
                .iter()
                .map(|ticker| self.update_one(ctx, ticker, params.day())),
        )
        .await?;
        debug!("Quotes refreshed for {} ticker(s)", tickers.len());
        Ok(())
    }
}

pub struct UpdateDividends {
    source: Arc<dyn MarketDataSourceTrait>,
}

impl UpdateDividends {
    pub fn new(source: Arc<dyn MarketDataSourceTrait>) -> Self {
        Self { source }
    }

    async fn update_one(&self, ctx: &UnitOfWork, ticker: &str, day: NaiveDate) -> Result<()> {
        let table = ctx.get_for_update::<DividendsTable>(ticker).await?;
        let mut table = table.lock().await;
        if is_newer(&*table, day) {
            return Ok(());
        }
        let rows = self.source.dividends(ticker).await?;
        if table
            .replace(rows)
            .map_err(|e| Error::domain(format!("dividends {ticker}: {e}")))?
        {
            debug!("Dividends of {} changed", ticker);
        }
        table.advance_day(day)
    }
}

#[async_trait]
impl Action<DataUpdateParams> for UpdateDividends {
    async fn run(&self, ctx: &UnitOfWork, params: &DataUpdateParams) -> Result<()> {
        join_all_errors(
            params
                .tickers()
                .iter()
                .map(|ticker| self.update_one(ctx, ticker, params.day())),
        )
        .await
    }
}

/// Reprices the portfolio at the refreshed closes.
pub struct UpdatePortfolio;

#[async_trait]
impl Action<DataUpdateParams> for UpdatePortfolio {
    async fn run(&self, ctx: &UnitOfWork, params: &DataUpdateParams) -> Result<()> {
        let tickers = params.tickers();
        let mut prices = HashMap::with_capacity(tickers.len());
        for ticker in &tickers {
            let quotes = ctx.get::<QuotesTable>(ticker).await?;
            let close = quotes.lock().await.last_close();
            if let Some(close) = close {
                prices.insert(ticker.clone(), close);
            }
        }

        let portfolio = ctx.get_for_update::<Portfolio>(PORTFOLIO_UID).await?;
        let mut portfolio = portfolio.lock().await;
        if is_newer(&*portfolio, params.day()) {
            params.set_revalued(portfolio.value);
            return Ok(());
        }
        portfolio.sync_tickers(&tickers);
        let value = portfolio.revalue(&prices);
        portfolio.advance_day(params.day())?;
        params.set_revalued(value);
        info!("Portfolio is worth {} at {}", value, params.day());
        Ok(())
    }
}
