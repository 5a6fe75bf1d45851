use std::path::PathBuf;
use std::sync::Arc;

use crate::constants::POOL_EXTRA_CONNECTIONS;
use crate::error::{AppError, Result};
use crate::services::database::StockStore;
use crate::worker::{run_batch, BatchReport};

pub fn run(db_path: PathBuf, symbol: Option<String>, concurrency: usize) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    match runtime.block_on(compute(&db_path, symbol, concurrency)) {
        Ok(report) => {
            println!(
                "✅ Indicators computed: {} stocks succeeded, {} rows written",
                report.succeeded, report.rows_written
            );
            if !report.failed.is_empty() {
                println!("⚠️  {} stocks failed:", report.failed.len());
                for (symbol, error) in &report.failed {
                    println!("   {} — {}", symbol, error);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Compute failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn compute(
    db_path: &PathBuf,
    symbol: Option<String>,
    concurrency: usize,
) -> Result<BatchReport> {
    // Pool at least as wide as the fan-out so tasks queue instead of starve
    let store = StockStore::open_with_pool_size(
        db_path,
        concurrency.max(1) as u32 + POOL_EXTRA_CONNECTIONS,
    )
    .await?;

    let stocks = match symbol {
        Some(symbol) => {
            let stock = store
                .get_stock_by_symbol(&symbol)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("symbol {}", symbol)))?;
            vec![stock]
        }
        None => store.list_active_stocks().await?,
    };

    println!("📊 Computing indicators for {} stocks...", stocks.len());
    let store = Arc::new(store);
    let report = run_batch(Arc::clone(&store), stocks, concurrency).await;
    store.close().await;
    Ok(report)
}
