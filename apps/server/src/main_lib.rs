use std::sync::Arc;

use async_trait::async_trait;
use poptimizer_core::bus::{Bus, Handler, IgnoreErrorsPolicy, IndefiniteRetryPolicy};
use poptimizer_core::data::{
    CheckTradingDayHandler, DataUpdateHandler, HttpMarketDataSource, MarketDataSourceTrait,
    TradingDayHandler,
};
use poptimizer_core::events::{CheckTradingDay, DataUpdated, NewTradingDay, PortfolioRevalued};
use poptimizer_core::store::EntityStore;
use poptimizer_core::uow::UnitOfWork;
use poptimizer_storage_sqlite::{
    create_pool, init, run_migrations, spawn_writer, SqliteDocumentRepository,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub bus: Bus,
    pub config: Config,
}

pub fn init_tracing() {
    let log_format = std::env::var("PO_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let db_path = init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);
    let pool = create_pool(&db_path)?;
    run_migrations(&pool)?;
    let writer = spawn_writer(Arc::clone(&pool));
    let store = EntityStore::new(Arc::new(SqliteDocumentRepository::new(pool, writer)));

    let source: Arc<dyn MarketDataSourceTrait> = Arc::new(HttpMarketDataSource::new(
        &config.data_url,
        config.http_timeout,
    )?);
    tracing::info!("Market data source: {}", config.data_url);

    Ok(Arc::new(AppState {
        bus: build_bus(store, source, config),
        config: config.clone(),
    }))
}

/// Wires the daily refresh cycle onto a new bus.
pub fn build_bus(
    store: EntityStore,
    source: Arc<dyn MarketDataSourceTrait>,
    config: &Config,
) -> Bus {
    let retry = IndefiniteRetryPolicy::with_backoff(config.retry);
    Bus::builder(store)
        .register::<CheckTradingDay, _, _>(
            Arc::new(CheckTradingDayHandler::new(Arc::clone(&source))),
            IgnoreErrorsPolicy,
        )
        .register::<NewTradingDay, _, _>(
            Arc::new(DataUpdateHandler::new(source, config.retry)),
            retry.clone(),
        )
        .register::<DataUpdated, _, _>(Arc::new(TradingDayHandler), retry)
        .register::<PortfolioRevalued, _, _>(Arc::new(RevaluationReporter), IgnoreErrorsPolicy)
        .build()
}

/// Reports portfolio values to the log.
struct RevaluationReporter;

#[async_trait]
impl Handler<PortfolioRevalued> for RevaluationReporter {
    async fn handle(
        &self,
        _ctx: &UnitOfWork,
        msg: &PortfolioRevalued,
    ) -> poptimizer_core::Result<()> {
        tracing::info!("Portfolio value on {}: {}", msg.day, msg.value);
        Ok(())
    }
}
