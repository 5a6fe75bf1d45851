use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stock identity record.
///
/// `stock_id` is a storage surrogate; the natural identity is the unique
/// ticker `symbol`. The stock owns its price and indicator history —
/// deleting a stock cascades to every dependent row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub stock_id: i64,
    pub symbol: String,
    /// Exchange-local code (e.g., the numeric KRX code), when known
    pub exchange_code: Option<String>,
    pub name: String,
    pub market: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub listing_date: Option<NaiveDate>,
    pub delisting_date: Option<NaiveDate>,
    pub is_active: bool,
}
