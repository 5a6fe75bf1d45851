//! Market breadth aggregation.
//!
//! For each (market, date) with at least one price row, counts
//! rising/falling/unchanged constituents by the sign of their change
//! rate and totals volume and turnover. Stocks with no row that day are
//! excluded entirely — they are not "unchanged". Upserts are keyed by
//! (market, date), so recomputation is idempotent.

use chrono::NaiveDate;
use tracing::{error, info};

use crate::error::Result;
use crate::models::{DailyPrice, MarketStat};
use crate::services::database::StockStore;

/// Summarize one market-day from its price rows. Returns `None` for an
/// empty day (no row is written for dates with no constituents).
pub fn summarize(market: &str, date: NaiveDate, rows: &[DailyPrice]) -> Option<MarketStat> {
    if rows.is_empty() {
        return None;
    }

    let mut rising = 0i64;
    let mut falling = 0i64;
    let mut unchanged = 0i64;
    let mut total_volume = 0i64;
    let mut total_value = 0.0f64;

    for row in rows {
        // A missing change_rate (first listed day) counts as unchanged so
        // the three buckets always sum to the constituent count.
        match row.change_rate {
            Some(rate) if rate > 0.0 => rising += 1,
            Some(rate) if rate < 0.0 => falling += 1,
            _ => unchanged += 1,
        }
        total_volume += row.volume;
        total_value += row.close * row.volume as f64;
    }

    Some(MarketStat {
        market: market.to_string(),
        date,
        rising_stocks: rising,
        falling_stocks: falling,
        unchanged_stocks: unchanged,
        total_stocks: rows.len() as i64,
        total_volume,
        total_value,
    })
}

/// Compute and upsert breadth statistics for one (market, date)
pub async fn aggregate_day(
    store: &StockStore,
    market: &str,
    date: NaiveDate,
) -> Result<Option<MarketStat>> {
    let rows = store.prices_for_market_date(market, date).await?;
    let stat = summarize(market, date, &rows);
    if let Some(stat) = &stat {
        store.upsert_market_stat(stat).await?;
    }
    Ok(stat)
}

/// Days aggregated / failed across a market pass
#[derive(Debug, Default)]
pub struct AggregateReport {
    pub days_written: usize,
    pub failed: Vec<(NaiveDate, String)>,
}

/// Aggregate every trading date present for a market. Per-day failures
/// are logged and collected; the pass continues.
pub async fn aggregate_market(store: &StockStore, market: &str) -> Result<AggregateReport> {
    let dates = store.market_dates(market).await?;
    let mut report = AggregateReport::default();

    for date in dates {
        match aggregate_day(store, market, date).await {
            Ok(Some(_)) => report.days_written += 1,
            Ok(None) => {}
            Err(e) => {
                error!(market, %date, error = %e, "Market aggregation failed for day");
                report.failed.push((date, e.to_string()));
            }
        }
    }

    info!(
        market,
        days = report.days_written,
        failures = report.failed.len(),
        "Market aggregation pass complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::test_support::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar_with_rate(stock_id: i64, d: NaiveDate, close: f64, volume: i64, rate: Option<f64>) -> DailyPrice {
        let mut bar = flat_bar(stock_id, d, close);
        bar.volume = volume;
        bar.change_rate = rate;
        bar
    }

    #[test]
    fn test_breadth_invariant() {
        let d = date(2024, 5, 2);
        let rows = vec![
            bar_with_rate(1, d, 100.0, 10, Some(1.2)),
            bar_with_rate(2, d, 50.0, 20, Some(-0.4)),
            bar_with_rate(3, d, 75.0, 30, Some(0.0)),
            bar_with_rate(4, d, 80.0, 40, None), // first listed day
        ];
        let stat = summarize("KOSPI", d, &rows).unwrap();

        assert_eq!(stat.rising_stocks, 1);
        assert_eq!(stat.falling_stocks, 1);
        assert_eq!(stat.unchanged_stocks, 2);
        assert_eq!(stat.total_stocks, 4);
        assert_eq!(
            stat.rising_stocks + stat.falling_stocks + stat.unchanged_stocks,
            stat.total_stocks
        );
        assert_eq!(stat.total_volume, 100);
        assert_eq!(stat.total_value, 100.0 * 10.0 + 50.0 * 20.0 + 75.0 * 30.0 + 80.0 * 40.0);
    }

    #[test]
    fn test_empty_day_produces_no_row() {
        assert_eq!(summarize("KOSPI", date(2024, 5, 2), &[]), None);
    }

    #[tokio::test]
    async fn test_aggregate_day_is_idempotent() {
        let (_dir, store) = open_temp_store().await;
        let a = store.upsert_stock(&sample_stock("AAA", "KOSPI")).await.unwrap();
        let b = store.upsert_stock(&sample_stock("BBB", "KOSPI")).await.unwrap();
        let d = date(2024, 5, 3);
        store
            .upsert_daily_prices(&[
                bar_with_rate(a, d, 100.0, 500, Some(2.0)),
                bar_with_rate(b, d, 30.0, 700, Some(-1.0)),
            ])
            .await
            .unwrap();

        let first = aggregate_day(&store, "KOSPI", d).await.unwrap().unwrap();
        let second = aggregate_day(&store, "KOSPI", d).await.unwrap().unwrap();
        assert_eq!(first, second);

        let stored = store.get_market_stat("KOSPI", d).await.unwrap().unwrap();
        assert_eq!(stored, first);
        assert_eq!(stored.total_stocks, 2);
    }

    #[tokio::test]
    async fn test_aggregate_market_walks_all_dates() {
        let (_dir, store) = open_temp_store().await;
        let a = store.upsert_stock(&sample_stock("AAA", "KOSPI")).await.unwrap();
        for day in 1..=4 {
            store
                .upsert_daily_prices(&[bar_with_rate(a, date(2024, 5, day), 100.0, 100, Some(0.5))])
                .await
                .unwrap();
        }

        let report = aggregate_market(&store, "KOSPI").await.unwrap();
        assert_eq!(report.days_written, 4);
        assert!(report.failed.is_empty());
        assert!(store.get_market_stat("KOSPI", date(2024, 5, 4)).await.unwrap().is_some());
    }
}
