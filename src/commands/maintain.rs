use std::path::PathBuf;

use chrono::Utc;

use crate::error::Result;
use crate::services::database::StockStore;
use crate::services::lifecycle::{run_maintenance, MaintenanceReport};

pub fn run(db_path: PathBuf) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    match runtime.block_on(maintain(&db_path)) {
        Ok(report) => {
            println!(
                "✅ Maintenance complete: {} chunks compressed, {} chunks dropped",
                report.compressed_chunks.len(),
                report.dropped_chunks.len()
            );
            for (table, chunk) in &report.compressed_chunks {
                println!("   compressed {} chunk {}", table, chunk);
            }
            for (table, chunk) in &report.dropped_chunks {
                println!("   dropped    {} chunk {}", table, chunk);
            }
        }
        Err(e) => {
            eprintln!("❌ Maintenance failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn maintain(db_path: &PathBuf) -> Result<MaintenanceReport> {
    let store = StockStore::open(db_path).await?;
    let report = run_maintenance(&store, Utc::now().date_naive()).await?;
    store.close().await;
    Ok(report)
}
