//! Background scheduler for periodic trading day checks.

use std::time::Duration;

use poptimizer_core::bus::Bus;
use poptimizer_core::events::CheckTradingDay;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Starts publishing [`CheckTradingDay`] every `period`, the first one
/// immediately. Stops when the bus shuts down.
pub fn start_trading_day_checker(bus: Bus, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Trading day checker started ({}s interval)", period.as_secs());
        let token = bus.shutdown_token().clone();
        let mut ticks = interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticks.tick() => {
                    debug!("Checking for a new trading day");
                    bus.publish(CheckTradingDay);
                }
            }
        }
        info!("Trading day checker stopped");
    })
}
