//! Daily market data refresh.
//!
//! - [`data_model`] - Row types and the entities refreshed every trading day
//! - [`data_traits`] - Market data source contract
//! - [`rows`] - Merging of dated rows into stored tables
//! - [`data_actions`] - DAG nodes of one refresh
//! - [`data_handlers`] - Bus handlers driving the refresh
//! - [`http_source`] - JSON over HTTP market data source
//!
//! ```text
//! CheckTradingDay ─▶ NewTradingDay ─▶ [refresh DAG] ─▶ DataUpdated ─▶ TradingDay saved
//!                                                  └▶ PortfolioRevalued
//! ```

mod data_actions;
mod data_handlers;
mod data_model;
mod data_traits;
mod http_source;
mod rows;


pub use data_actions::{
    build_data_update_dag, DataUpdateParams, UpdateDividends, UpdateIndexes, UpdatePortfolio,
    UpdateQuotes, UpdateSecurities,
};
pub use data_handlers::{CheckTradingDayHandler, DataUpdateHandler, TradingDayHandler};
pub use data_model::*;
pub use data_traits::MarketDataSourceTrait;
pub use http_source::HttpMarketDataSource;
