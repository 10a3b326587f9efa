mod config;
mod main_lib;
mod scheduler;

use config::Config;
use main_lib::{build_state, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing();
    let state = build_state(&config).await?;

    let checker =
        scheduler::start_trading_day_checker(state.bus.clone(), state.config.check_interval);

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Interrupt received, shutting down");
        }
        _ = state.bus.shutdown_token().cancelled() => {
            tracing::error!("Message bus stopped on a fatal error");
        }
    }

    state.bus.shutdown();
    checker.await?;
    state.bus.wait().await?;
    tracing::info!("Stopped");
    Ok(())
}
