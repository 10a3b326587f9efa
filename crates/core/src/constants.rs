use std::time::Duration;

use chrono::NaiveDate;

/// Day every auto-created entity starts at, before any data was loaded.
pub fn start_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(1997, 3, 24).unwrap_or(NaiveDate::MIN)
}

/// Delay before the first retry of a failed handler or DAG node.
pub const DEFAULT_FIRST_RETRY: Duration = Duration::from_secs(30);

/// Multiplier applied to the retry delay after each further failure.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Page size used when streaming whole collections from storage.
pub const SCAN_PAGE_SIZE: i64 = 256;

/// Index tickers refreshed every trading day.
pub const INDEX_TICKERS: [&str; 4] = ["MCFTRR", "MEOGTRR", "IMOEX", "RVI"];

/// Default uid of the single portfolio entity.
pub const PORTFOLIO_UID: &str = "main";

/// Uid of the entity tracking the last refreshed trading day.
pub const TRADING_DAY_UID: &str = "last";

/// Uid of the single securities list.
pub const SECURITIES_UID: &str = "all";
