use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Derived indicator row for one (stock, date).
///
/// Every field is recomputable from the stock's price history alone; the
/// indicator engine is the sole writer. `None` means the rolling window
/// was not yet full on that date — never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicator {
    pub stock_id: i64,
    pub date: NaiveDate,

    // Simple moving averages of close
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub ma120: Option<f64>,

    // Bollinger Bands (20, 2 sigma)
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_width: Option<f64>,

    pub rsi: Option<f64>,

    // MACD(12, 26, 9)
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,

    pub volume_ma20: Option<f64>,
    pub volume_ratio: Option<f64>,

    // Single-day candle patterns
    pub is_doji: bool,
    pub is_hammer: bool,

    // Cross and band-touch signals (false, not null, when inputs missing)
    pub golden_cross: bool,
    pub death_cross: bool,
    pub bb_upper_touch: bool,
    pub bb_lower_touch: bool,
}

impl TechnicalIndicator {
    /// Empty row for a date whose windows are all still warming up
    pub fn empty(stock_id: i64, date: NaiveDate) -> Self {
        Self {
            stock_id,
            date,
            ma5: None,
            ma10: None,
            ma20: None,
            ma60: None,
            ma120: None,
            bb_upper: None,
            bb_middle: None,
            bb_lower: None,
            bb_width: None,
            rsi: None,
            macd: None,
            macd_signal: None,
            macd_hist: None,
            volume_ma20: None,
            volume_ratio: None,
            is_doji: false,
            is_hammer: false,
            golden_cross: false,
            death_cross: false,
            bb_upper_touch: false,
            bb_lower_touch: false,
        }
    }
}
