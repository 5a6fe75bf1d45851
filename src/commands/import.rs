use std::collections::HashMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::models::{DailyPrice, Stock};
use crate::services::database::StockStore;

/// One CSV line of the bar feed. `name`/`market` are only needed the
/// first time a symbol appears; `change`/`change_rate` are derived from
/// the stored history when the feed omits them.
#[derive(Debug, Deserialize)]
struct BarRecord {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    market: Option<String>,
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    adjusted_close: Option<f64>,
    volume: i64,
    #[serde(default)]
    change: Option<f64>,
    #[serde(default)]
    change_rate: Option<f64>,
}

pub fn run(db_path: PathBuf, file: PathBuf) {
    println!("📥 Importing price bars from {:?}", file);

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    match runtime.block_on(import(&db_path, &file)) {
        Ok((stocks, bars)) => {
            println!("✅ Imported {} bars across {} stocks", bars, stocks);
        }
        Err(e) => {
            eprintln!("❌ Import failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn import(db_path: &PathBuf, file: &PathBuf) -> Result<(usize, usize)> {
    let store = StockStore::open(db_path).await?;
    store.define_schema().await?;

    let mut reader = csv::Reader::from_path(file)
        .map_err(|e| AppError::Io(format!("cannot open {:?}: {}", file, e)))?;

    // Group bars per symbol so each stock is one upsert transaction.
    let mut per_symbol: HashMap<String, Vec<BarRecord>> = HashMap::new();
    for record in reader.deserialize::<BarRecord>() {
        let record = record?;
        per_symbol.entry(record.symbol.clone()).or_default().push(record);
    }

    let mut total_bars = 0usize;
    let stocks = per_symbol.len();

    for (symbol, mut records) in per_symbol {
        records.sort_by_key(|r| r.date);
        let first = &records[0];
        let stock = Stock {
            stock_id: 0,
            symbol: symbol.clone(),
            exchange_code: None,
            name: first.name.clone().unwrap_or_else(|| symbol.clone()),
            market: first.market.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
            sector: None,
            industry: None,
            listing_date: None,
            delisting_date: None,
            is_active: true,
        };
        let stock_id = store.upsert_stock(&stock).await?;

        let mut prev_close = store.latest_close_before(stock_id, first.date).await?;
        let mut bars = Vec::with_capacity(records.len());
        for record in records {
            if record.high < record.low {
                warn!(symbol = %symbol, date = %record.date, "Skipping bar with high < low");
                continue;
            }
            let (change, change_rate) = match (record.change, record.change_rate, prev_close) {
                (Some(c), Some(r), _) => (Some(c), Some(r)),
                (_, _, Some(prev)) if prev != 0.0 => {
                    let c = record.close - prev;
                    (Some(c), Some(c / prev))
                }
                _ => (record.change, record.change_rate),
            };
            prev_close = Some(record.close);
            bars.push(DailyPrice {
                stock_id,
                date: record.date,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                adjusted_close: record.adjusted_close,
                volume: record.volume,
                change,
                change_rate,
            });
        }

        total_bars += store.upsert_daily_prices(&bars).await?;
    }

    store.close().await;
    Ok((stocks, total_bars))
}
