use std::path::PathBuf;

use crate::constants::{CHUNK_INTERVAL_MONTHS, COMPRESSION_AFTER_MONTHS, RETENTION_MONTHS};
use crate::error::Result;
use crate::services::database::StockStore;
use crate::services::lifecycle::{
    partition_table, set_compression_policy, set_retention_policy, PolicyOutcome,
};

/// Time-series tables and the entity key their compressed chunks are
/// segmented by
const PARTITIONED_TABLES: [(&str, &str); 4] = [
    ("daily_prices", "stock_id"),
    ("technical_indicators", "stock_id"),
    ("market_indices", "market"),
    ("market_stats", "market"),
];

pub fn run(db_path: PathBuf) {
    println!("🗄️  Initializing market database at {:?}", db_path);

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    let result = runtime.block_on(initialize(&db_path));

    match result {
        Ok(()) => println!("✅ Initialization complete"),
        Err(e) => {
            eprintln!("❌ Initialization failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn initialize(db_path: &PathBuf) -> Result<()> {
    let store = StockStore::open(db_path).await?;

    store.define_schema().await?;
    println!("   Tables and indexes created");

    // Policy failures are warnings: every remaining declaration still runs.
    for (table, segment_by) in PARTITIONED_TABLES {
        report(
            table,
            "partition",
            partition_table(&store, table, "date", CHUNK_INTERVAL_MONTHS).await?,
        );
        report(
            table,
            "compression",
            set_compression_policy(&store, table, segment_by, COMPRESSION_AFTER_MONTHS).await?,
        );
        report(
            table,
            "retention",
            set_retention_policy(&store, table, RETENTION_MONTHS).await?,
        );
    }

    store.close().await;
    Ok(())
}

fn report(table: &str, what: &str, outcome: PolicyOutcome) {
    match outcome {
        PolicyOutcome::Applied => println!("   {} {}: applied", table, what),
        PolicyOutcome::AlreadySet => println!("   {} {}: already set", table, what),
        PolicyOutcome::Failed(reason) => println!("   ⚠️  {} {}: {}", table, what, reason),
    }
}
