//! Per-stock indicator computation.
//!
//! Consumes one stock's full ordered price history and produces one
//! derived row per date, strictly causal (a row only sees bars at or
//! before its own date). Recomputation over the same history is
//! idempotent: rows are upserted by (stock_id, date), so a backfill
//! correction shifts exactly the dates whose windows span the corrected
//! bar and leaves every other row untouched.

use tracing::{debug, info};

use crate::constants::{
    BOLLINGER_K, BOLLINGER_WINDOW, CROSS_LONG_WINDOW, CROSS_SHORT_WINDOW, DOJI_BODY_RATIO,
    MACD_FAST, MACD_SIGNAL, MACD_SLOW, MA_WINDOWS, RSI_PERIOD, VOLUME_MA_WINDOW,
};
use crate::error::Result;
use crate::models::indicators::{self, cross_down, cross_up};
use crate::models::{DailyPrice, Stock, TechnicalIndicator};
use crate::services::database::StockStore;

/// Compute the full indicator series for one stock's ascending history.
///
/// Pure: no storage access, one output row per input bar.
pub fn compute_series(prices: &[DailyPrice]) -> Vec<TechnicalIndicator> {
    let n = prices.len();
    if n == 0 {
        return Vec::new();
    }

    let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();
    let volumes: Vec<f64> = prices.iter().map(|p| p.volume as f64).collect();

    let mas: Vec<Vec<Option<f64>>> = MA_WINDOWS
        .iter()
        .map(|w| indicators::sma(&closes, *w))
        .collect();
    let bb = indicators::bollinger(&closes, BOLLINGER_WINDOW, BOLLINGER_K);
    let rsi = indicators::rsi(&closes, RSI_PERIOD);
    let macd = indicators::macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let volume_ma = indicators::sma(&volumes, VOLUME_MA_WINDOW);

    let short = indicators::sma(&closes, CROSS_SHORT_WINDOW);
    let long = indicators::sma(&closes, CROSS_LONG_WINDOW);

    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let bar = &prices[i];
        let mut row = TechnicalIndicator::empty(bar.stock_id, bar.date);

        row.ma5 = mas[0][i];
        row.ma10 = mas[1][i];
        row.ma20 = mas[2][i];
        row.ma60 = mas[3][i];
        row.ma120 = mas[4][i];

        row.bb_upper = bb.upper[i];
        row.bb_middle = bb.middle[i];
        row.bb_lower = bb.lower[i];
        row.bb_width = bb.width[i];

        row.rsi = rsi[i];
        row.macd = macd.macd[i];
        row.macd_signal = macd.signal[i];
        row.macd_hist = macd.histogram[i];

        row.volume_ma20 = volume_ma[i];
        row.volume_ratio = match volume_ma[i] {
            Some(ma) if ma > 0.0 => Some(bar.volume as f64 / ma),
            _ => None,
        };

        row.is_doji = indicators::is_doji(bar.open, bar.high, bar.low, bar.close, DOJI_BODY_RATIO);
        row.is_hammer = indicators::is_hammer(bar.open, bar.high, bar.low, bar.close);

        if i > 0 {
            row.golden_cross = cross_up(short[i - 1], long[i - 1], short[i], long[i]);
            row.death_cross = cross_down(short[i - 1], long[i - 1], short[i], long[i]);
        }

        if let (Some(upper), Some(lower)) = (bb.upper[i], bb.lower[i]) {
            row.bb_upper_touch = bar.close >= upper;
            row.bb_lower_touch = bar.close <= lower;
        }

        rows.push(row);
    }

    rows
}

/// Recompute and persist one stock's full indicator series.
///
/// The upsert batch is a single transaction — the stock's persistence
/// unit. Returns the number of rows written.
pub async fn recompute_stock(store: &StockStore, stock: &Stock) -> Result<usize> {
    let history = store.price_history(stock.stock_id).await?;
    if history.is_empty() {
        debug!(symbol = %stock.symbol, "No price history, skipping indicator pass");
        return Ok(0);
    }

    let rows = compute_series(&history);
    let written = store.upsert_indicators(&rows).await?;
    info!(symbol = %stock.symbol, rows = written, "Indicators recomputed");
    Ok(written)
}
