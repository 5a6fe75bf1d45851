//! Bounded parallel indicator fan-out.
//!
//! Each stock's computation and write is independent of every other
//! stock's (no shared mutable state), so the batch is processed in
//! concurrency-sized groups of spawned tasks. A stock that fails is
//! logged with its symbol and collected into the report; the batch
//! continues for the rest.

use std::sync::Arc;
use tracing::{error, info};

use crate::models::Stock;
use crate::services::database::StockStore;
use crate::services::indicator_engine;

/// Per-batch summary of successes and failures
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    pub rows_written: usize,
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }
}

/// Recompute indicators for every stock in `stocks`, at most
/// `concurrency` in flight at once.
pub async fn run_batch(
    store: Arc<StockStore>,
    stocks: Vec<Stock>,
    concurrency: usize,
) -> BatchReport {
    let concurrency = concurrency.max(1);
    let total = stocks.len();
    info!(stocks = total, concurrency, "Starting indicator fan-out");

    let mut report = BatchReport::default();

    for group in stocks.chunks(concurrency) {
        let mut tasks = Vec::with_capacity(group.len());
        for stock in group {
            let store = Arc::clone(&store);
            let stock = stock.clone();
            tasks.push(tokio::spawn(async move {
                let result = indicator_engine::recompute_stock(&store, &stock).await;
                (stock.symbol, result)
            }));
        }

        for task in futures::future::join_all(tasks).await {
            match task {
                Ok((_symbol, Ok(rows))) => {
                    report.succeeded += 1;
                    report.rows_written += rows;
                }
                Ok((symbol, Err(e))) => {
                    error!(symbol = %symbol, error = %e, "Indicator computation failed, continuing batch");
                    report.failed.push((symbol, e.to_string()));
                }
                Err(join_err) => {
                    error!(error = %join_err, "Indicator task panicked, continuing batch");
                    report.failed.push(("<unknown>".to_string(), join_err.to_string()));
                }
            }
        }
    }

    info!(
        succeeded = report.succeeded,
        failed = report.failed.len(),
        rows = report.rows_written,
        "Indicator fan-out complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::test_support::*;
    use chrono::{Days, NaiveDate};

    #[tokio::test]
    async fn test_batch_processes_all_stocks() {
        let (_dir, store) = open_temp_store().await;
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();

        for symbol in ["AAA", "BBB", "CCC", "DDD"] {
            let id = store.upsert_stock(&sample_stock(symbol, "KOSPI")).await.unwrap();
            let bars: Vec<_> = (0..30)
                .map(|i| flat_bar(id, start + Days::new(i), 100.0 + i as f64))
                .collect();
            store.upsert_daily_prices(&bars).await.unwrap();
        }
        // A stock with no history succeeds with zero rows
        store.upsert_stock(&sample_stock("EEE", "KOSPI")).await.unwrap();

        let store = Arc::new(store);
        let stocks = store.list_active_stocks().await.unwrap();
        let report = run_batch(Arc::clone(&store), stocks, 2).await;

        assert_eq!(report.total(), 5);
        assert_eq!(report.succeeded, 5);
        assert!(report.failed.is_empty());
        assert_eq!(report.rows_written, 4 * 30);

        let aaa = store.get_stock_by_symbol("AAA").await.unwrap().unwrap();
        let rows = store.indicators_for_stock(aaa.stock_id).await.unwrap();
        assert_eq!(rows.len(), 30);
    }

    #[tokio::test]
    async fn test_batch_with_width_larger_than_pool_queues() {
        let (_dir, store) = open_temp_store().await;
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        for symbol in ["AAA", "BBB", "CCC"] {
            let id = store.upsert_stock(&sample_stock(symbol, "KOSPI")).await.unwrap();
            store
                .upsert_daily_prices(&[flat_bar(id, start, 100.0)])
                .await
                .unwrap();
        }

        let store = Arc::new(store);
        let stocks = store.list_active_stocks().await.unwrap();
        // Oversized width back-pressures on the pool instead of failing
        let report = run_batch(store, stocks, 64).await;
        assert_eq!(report.succeeded, 3);
    }
}
