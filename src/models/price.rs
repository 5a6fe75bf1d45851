use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV bar for one stock.
///
/// Unique per (stock_id, date). Written once by ingestion; late
/// corrections overwrite via the same natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrice {
    pub stock_id: i64,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: Option<f64>,
    pub volume: i64,
    /// Absolute close change vs the prior trading day
    pub change: Option<f64>,
    /// Relative close change vs the prior trading day
    pub change_rate: Option<f64>,
}

/// Market-level daily bar (index OHLCV), unique per (market, date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIndex {
    pub market: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub change: Option<f64>,
    pub change_rate: Option<f64>,
}
