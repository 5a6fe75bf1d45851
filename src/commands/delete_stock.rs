use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::services::database::{CascadeReport, StockStore};

pub fn run(db_path: PathBuf, symbol: String) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    match runtime.block_on(delete(&db_path, &symbol)) {
        Ok(report) => {
            println!(
                "✅ Deleted {} ({} price bars, {} indicator rows removed)",
                symbol, report.prices_deleted, report.indicators_deleted
            );
        }
        Err(e) => {
            eprintln!("❌ Delete failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn delete(db_path: &PathBuf, symbol: &str) -> Result<CascadeReport> {
    let store = StockStore::open(db_path).await?;
    let stock = store
        .get_stock_by_symbol(symbol)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("symbol {}", symbol)))?;
    let report = store.delete_stock(stock.stock_id).await?;
    store.close().await;
    Ok(report)
}
