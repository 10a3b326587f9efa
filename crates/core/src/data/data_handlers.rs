//! Bus handlers of the refresh cycle.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::{debug, info};

use super::data_actions::build_data_update_dag;
use super::data_model::TradingDay;
use super::data_traits::MarketDataSourceTrait;
use crate::bus::{Backoff, Handler};
use crate::constants::TRADING_DAY_UID;
use crate::errors::Result;
use crate::events::{CheckTradingDay, DataUpdated, NewTradingDay, PortfolioRevalued};
use crate::uow::UnitOfWork;

/// Announces a trading day newer than the last refreshed one.
///
/// At most one day is in flight: a new day is announced only after the
/// previous announcement was refreshed.
pub struct CheckTradingDayHandler {
    source: Arc<dyn MarketDataSourceTrait>,
    announced: Mutex<Option<NaiveDate>>,
}

impl CheckTradingDayHandler {
    pub fn new(source: Arc<dyn MarketDataSourceTrait>) -> Self {
        Self {
            source,
            announced: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Handler<CheckTradingDay> for CheckTradingDayHandler {
    async fn handle(&self, ctx: &UnitOfWork, _msg: &CheckTradingDay) -> Result<()> {
        let last = self.source.last_trading_day().await?;
        let stored = ctx
            .get::<TradingDay>(TRADING_DAY_UID)
            .await?
            .lock()
            .await
            .day();
        if last <= stored {
            debug!("No new trading day after {}", stored);
            return Ok(());
        }

        {
            let mut announced = self
                .announced
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(pending) = *announced {
                if pending > stored {
                    debug!("Trading day {} is still being refreshed", pending);
                    return Ok(());
                }
            }
            *announced = Some(last);
        }

        info!("New trading day {}", last);
        ctx.publish(NewTradingDay { day: last });
        Ok(())
    }
}

/// Refreshes every table for the announced day.
pub struct DataUpdateHandler {
    source: Arc<dyn MarketDataSourceTrait>,
    backoff: Backoff,
}

impl DataUpdateHandler {
    pub fn new(source: Arc<dyn MarketDataSourceTrait>, backoff: Backoff) -> Self {
        Self { source, backoff }
    }
}

#[async_trait]
impl Handler<NewTradingDay> for DataUpdateHandler {
    async fn handle(&self, ctx: &UnitOfWork, msg: &NewTradingDay) -> Result<()> {
        let dag = build_data_update_dag(ctx.bus(), Arc::clone(&self.source), msg.day, self.backoff)?;
        let params = dag.run().await?;

        ctx.publish(DataUpdated { day: msg.day });
        if let Some(value) = params.revalued() {
            ctx.publish(PortfolioRevalued {
                day: msg.day,
                value,
            });
        }
        Ok(())
    }
}

/// Records the refreshed day.
pub struct TradingDayHandler;

#[async_trait]
impl Handler<DataUpdated> for TradingDayHandler {
    async fn handle(&self, ctx: &UnitOfWork, msg: &DataUpdated) -> Result<()> {
        let stored = ctx
            .get::<TradingDay>(TRADING_DAY_UID)
            .await?
            .lock()
            .await
            .day();
        if msg.day <= stored {
            debug!("Trading day {} already recorded", msg.day);
            return Ok(());
        }

        let trading_day = ctx.get_for_update::<TradingDay>(TRADING_DAY_UID).await?;
        let mut trading_day = trading_day.lock().await;
        trading_day.advance_day(msg.day)?;
        trading_day.last_refresh = Some(Utc::now());
        info!("Data refreshed up to {}", msg.day);
        Ok(())
    }
}
