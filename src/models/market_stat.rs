use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily breadth statistics for one market, unique per (market, date).
///
/// Counts cover only stocks that have a price row that day; the
/// aggregation engine is the sole writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStat {
    pub market: String,
    pub date: NaiveDate,
    pub rising_stocks: i64,
    pub falling_stocks: i64,
    pub unchanged_stocks: i64,
    pub total_stocks: i64,
    pub total_volume: i64,
    /// Turnover: sum of close * volume across the market
    pub total_value: f64,
}
