use std::path::PathBuf;

use crate::error::Result;
use crate::services::database::{StockStore, StoreStats};
use crate::services::lifecycle::chunk_summary;

pub fn run(db_path: PathBuf) {
    println!("📊 Market Database Status\n");

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    match runtime.block_on(status(&db_path)) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn status(db_path: &PathBuf) -> Result<()> {
    let store = StockStore::open(db_path).await?;
    store.define_schema().await?;

    let stats: StoreStats = store.stats().await?;
    println!("📈 Stocks:            {:>10}", stats.stocks);
    println!("   Price bars:        {:>10}", stats.prices);
    println!("   Indicator rows:    {:>10}", stats.indicators);
    println!("   Market-stat rows:  {:>10}", stats.market_stats);
    match stats.date_range {
        Some((min, max)) => println!("   Coverage:          {} → {}", min, max),
        None => println!("   Coverage:          (no data)"),
    }

    let chunks = chunk_summary(&store).await?;
    if chunks.is_empty() {
        println!("\n🧱 No chunk catalog yet — run 'init' and 'maintain'");
    } else {
        println!("\n🧱 Chunks (compressed/total):");
        for (table, total, compressed) in chunks {
            println!("   {:<24} {:>4}/{:<4}", table, compressed, total);
        }
    }

    store.close().await;
    Ok(())
}
