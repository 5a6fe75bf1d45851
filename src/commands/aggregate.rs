use std::path::PathBuf;

use crate::error::Result;
use crate::services::database::StockStore;
use crate::services::market_aggregator;
use crate::utils::parse_date;

pub fn run(db_path: PathBuf, market: String, date: Option<String>) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    match runtime.block_on(aggregate(&db_path, &market, date)) {
        Ok((days, failures)) => {
            println!("✅ Breadth stats written for {} market-days ({})", days, market);
            for (date, error) in failures {
                println!("⚠️  {} — {}", date, error);
            }
        }
        Err(e) => {
            eprintln!("❌ Aggregation failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn aggregate(
    db_path: &PathBuf,
    market: &str,
    date: Option<String>,
) -> Result<(usize, Vec<(chrono::NaiveDate, String)>)> {
    let store = StockStore::open(db_path).await?;

    let result = match date {
        Some(date) => {
            let date = parse_date(&date)?;
            let written = market_aggregator::aggregate_day(&store, market, date).await?;
            (usize::from(written.is_some()), Vec::new())
        }
        None => {
            let report = market_aggregator::aggregate_market(&store, market).await?;
            (report.days_written, report.failed)
        }
    };

    store.close().await;
    Ok(result)
}
