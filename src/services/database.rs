use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use tracing::info;

use crate::constants::{DEFAULT_CONCURRENCY, POOL_EXTRA_CONNECTIONS};
use crate::error::{AppError, Result};
use crate::models::{
    DailyPrice, MarketIndex, MarketStat, PriceHistory, Stock, TechnicalIndicator,
};

/// Storage handle for the five market-data tables.
///
/// Constructed once and passed by reference into every operation; there
/// is no process-wide singleton. Closing the pool is explicit, and
/// dropping the handle releases it on every exit path.
#[derive(Debug)]
pub struct StockStore {
    pool: SqlitePool,
    database_path: PathBuf,
}

impl StockStore {
    /// Open (creating if missing) the database with a pool sized for the
    /// default indicator fan-out width.
    pub async fn open(database_path: &Path) -> Result<Self> {
        Self::open_with_pool_size(
            database_path,
            DEFAULT_CONCURRENCY as u32 + POOL_EXTRA_CONNECTIONS,
        )
        .await
    }

    /// Open with an explicit pool size. Keep this at least as large as
    /// the worker-pool width so the fan-out queues on the pool instead
    /// of starving.
    pub async fn open_with_pool_size(database_path: &Path, max_connections: u32) -> Result<Self> {
        info!("Opening market database at: {:?}", database_path);

        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;

        Ok(Self {
            pool,
            database_path: database_path.to_path_buf(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.database_path
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Market database connection pool closed");
    }

    /// Create tables and indexes if absent. Idempotent: safe to call on
    /// every startup against an already-initialized database.
    pub async fn define_schema(&self) -> Result<()> {
        let tables = [
            r#"
            CREATE TABLE IF NOT EXISTS stocks (
                stock_id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL UNIQUE,
                exchange_code TEXT,
                name TEXT NOT NULL,
                market TEXT NOT NULL,
                sector TEXT,
                industry TEXT,
                listing_date DATE,
                delisting_date DATE,
                is_active INTEGER NOT NULL DEFAULT 1
            )
            "#,
            // Surrogate id plus a unique natural key (stock_id, date):
            // correctness always addresses rows by the natural key, the
            // rowid is storage convenience only.
            r#"
            CREATE TABLE IF NOT EXISTS daily_prices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stock_id INTEGER NOT NULL REFERENCES stocks(stock_id) ON DELETE CASCADE,
                date DATE NOT NULL,
                open_price REAL NOT NULL,
                high_price REAL NOT NULL,
                low_price REAL NOT NULL,
                close_price REAL NOT NULL,
                adjusted_close REAL,
                volume INTEGER NOT NULL,
                change REAL,
                change_rate REAL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS technical_indicators (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stock_id INTEGER NOT NULL REFERENCES stocks(stock_id) ON DELETE CASCADE,
                date DATE NOT NULL,
                ma5 REAL, ma10 REAL, ma20 REAL, ma60 REAL, ma120 REAL,
                bb_upper REAL, bb_middle REAL, bb_lower REAL, bb_width REAL,
                rsi REAL,
                macd REAL, macd_signal REAL, macd_hist REAL,
                volume_ma20 REAL, volume_ratio REAL,
                is_doji INTEGER NOT NULL DEFAULT 0,
                is_hammer INTEGER NOT NULL DEFAULT 0,
                golden_cross INTEGER NOT NULL DEFAULT 0,
                death_cross INTEGER NOT NULL DEFAULT 0,
                bb_upper_touch INTEGER NOT NULL DEFAULT 0,
                bb_lower_touch INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS market_indices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                market TEXT NOT NULL,
                date DATE NOT NULL,
                open_index REAL NOT NULL,
                high_index REAL NOT NULL,
                low_index REAL NOT NULL,
                close_index REAL NOT NULL,
                volume INTEGER NOT NULL,
                change REAL,
                change_rate REAL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS market_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                market TEXT NOT NULL,
                date DATE NOT NULL,
                rising_stocks INTEGER NOT NULL,
                falling_stocks INTEGER NOT NULL,
                unchanged_stocks INTEGER NOT NULL,
                total_stocks INTEGER NOT NULL,
                total_volume INTEGER NOT NULL,
                total_value REAL NOT NULL
            )
            "#,
        ];

        for ddl in tables {
            sqlx::query(ddl).execute(&self.pool).await?;
        }

        let indexes = [
            // Natural keys
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_daily_prices_stock_date ON daily_prices(stock_id, date)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_tech_indicators_stock_date ON technical_indicators(stock_id, date)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_market_indices_market_date ON market_indices(market, date)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_market_stats_market_date ON market_stats(market, date)",
            // Date-range scans per table
            "CREATE INDEX IF NOT EXISTS idx_daily_prices_date ON daily_prices(date)",
            "CREATE INDEX IF NOT EXISTS idx_tech_indicators_date ON technical_indicators(date)",
            "CREATE INDEX IF NOT EXISTS idx_market_indices_date ON market_indices(date)",
            "CREATE INDEX IF NOT EXISTS idx_market_stats_date ON market_stats(date)",
            // Screening queries
            "CREATE INDEX IF NOT EXISTS idx_tech_indicators_rsi ON technical_indicators(rsi)",
            "CREATE INDEX IF NOT EXISTS idx_tech_indicators_volume_ratio ON technical_indicators(volume_ratio)",
            // Stock lookup
            "CREATE INDEX IF NOT EXISTS idx_stocks_market ON stocks(market)",
        ];

        for index in indexes {
            sqlx::query(index).execute(&self.pool).await?;
        }

        info!("Database schema initialized");
        Ok(())
    }

    // ---- stocks ----

    /// Insert the stock if its symbol is new, otherwise refresh the
    /// identity fields. Returns the stock_id either way.
    pub async fn upsert_stock(&self, stock: &Stock) -> Result<i64> {
        sqlx::query(
            r#"
            INSERT INTO stocks (symbol, exchange_code, name, market, sector, industry,
                                listing_date, delisting_date, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(symbol) DO UPDATE SET
                exchange_code = excluded.exchange_code,
                name = excluded.name,
                market = excluded.market,
                sector = excluded.sector,
                industry = excluded.industry,
                listing_date = excluded.listing_date,
                delisting_date = excluded.delisting_date,
                is_active = excluded.is_active
            "#,
        )
        .bind(&stock.symbol)
        .bind(stock.exchange_code.as_deref())
        .bind(&stock.name)
        .bind(&stock.market)
        .bind(stock.sector.as_deref())
        .bind(stock.industry.as_deref())
        .bind(stock.listing_date)
        .bind(stock.delisting_date)
        .bind(stock.is_active)
        .execute(&self.pool)
        .await?;

        let id: i64 = sqlx::query_scalar("SELECT stock_id FROM stocks WHERE symbol = ?1")
            .bind(&stock.symbol)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn get_stock_by_symbol(&self, symbol: &str) -> Result<Option<Stock>> {
        let row = sqlx::query("SELECT * FROM stocks WHERE symbol = ?1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_stock(&r)).transpose()
    }

    pub async fn list_active_stocks(&self) -> Result<Vec<Stock>> {
        let rows = sqlx::query("SELECT * FROM stocks WHERE is_active = 1 ORDER BY symbol")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_stock).collect()
    }

    /// Explicit cascade delete: indicator rows, price rows, then the
    /// stock itself, in one transaction.
    pub async fn delete_stock(&self, stock_id: i64) -> Result<CascadeReport> {
        let mut tx = self.pool.begin().await?;

        let indicators = sqlx::query("DELETE FROM technical_indicators WHERE stock_id = ?1")
            .bind(stock_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let prices = sqlx::query("DELETE FROM daily_prices WHERE stock_id = ?1")
            .bind(stock_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let stocks = sqlx::query("DELETE FROM stocks WHERE stock_id = ?1")
            .bind(stock_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if stocks == 0 {
            return Err(AppError::NotFound(format!("stock_id {}", stock_id)));
        }
        Ok(CascadeReport {
            prices_deleted: prices,
            indicators_deleted: indicators,
        })
    }

    // ---- daily prices ----

    /// Upsert price bars by (stock_id, date) in one transaction. Late
    /// corrections overwrite the existing row; duplicates never
    /// accumulate.
    pub async fn upsert_daily_prices(&self, bars: &[DailyPrice]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0usize;

        for bar in bars {
            let result = sqlx::query(
                r#"
                INSERT INTO daily_prices
                    (stock_id, date, open_price, high_price, low_price, close_price,
                     adjusted_close, volume, change, change_rate)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(stock_id, date) DO UPDATE SET
                    open_price = excluded.open_price,
                    high_price = excluded.high_price,
                    low_price = excluded.low_price,
                    close_price = excluded.close_price,
                    adjusted_close = excluded.adjusted_close,
                    volume = excluded.volume,
                    change = excluded.change,
                    change_rate = excluded.change_rate
                "#,
            )
            .bind(bar.stock_id)
            .bind(bar.date)
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.adjusted_close)
            .bind(bar.volume)
            .bind(bar.change)
            .bind(bar.change_rate)
            .execute(&mut *tx)
            .await?;
            affected += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(affected)
    }

    /// Full ordered history for one stock, ascending by date
    pub async fn price_history(&self, stock_id: i64) -> Result<PriceHistory> {
        let rows = sqlx::query("SELECT * FROM daily_prices WHERE stock_id = ?1 ORDER BY date ASC")
            .bind(stock_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_daily_price).collect()
    }

    /// Most recent stored close at or before `before`, for computing
    /// change/change_rate of an incoming bar
    pub async fn latest_close_before(
        &self,
        stock_id: i64,
        before: NaiveDate,
    ) -> Result<Option<f64>> {
        let close = sqlx::query_scalar(
            "SELECT close_price FROM daily_prices WHERE stock_id = ?1 AND date < ?2 ORDER BY date DESC LIMIT 1",
        )
        .bind(stock_id)
        .bind(before)
        .fetch_optional(&self.pool)
        .await?;
        Ok(close)
    }

    /// All price rows for one market on one date (stocks with no row
    /// that day are simply absent)
    pub async fn prices_for_market_date(
        &self,
        market: &str,
        date: NaiveDate,
    ) -> Result<Vec<DailyPrice>> {
        let rows = sqlx::query(
            r#"
            SELECT p.* FROM daily_prices p
            JOIN stocks s ON s.stock_id = p.stock_id
            WHERE s.market = ?1 AND p.date = ?2
            "#,
        )
        .bind(market)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_daily_price).collect()
    }

    /// Distinct trading dates present for a market, ascending
    pub async fn market_dates(&self, market: &str) -> Result<Vec<NaiveDate>> {
        let dates = sqlx::query_scalar(
            r#"
            SELECT DISTINCT p.date FROM daily_prices p
            JOIN stocks s ON s.stock_id = p.stock_id
            WHERE s.market = ?1
            ORDER BY p.date ASC
            "#,
        )
        .bind(market)
        .fetch_all(&self.pool)
        .await?;
        Ok(dates)
    }

    // ---- technical indicators ----

    /// Upsert one stock's indicator batch in a single transaction (the
    /// per-stock persistence unit: a failure rolls back only this batch)
    pub async fn upsert_indicators(&self, rows: &[TechnicalIndicator]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0usize;

        for ind in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO technical_indicators
                    (stock_id, date, ma5, ma10, ma20, ma60, ma120,
                     bb_upper, bb_middle, bb_lower, bb_width, rsi,
                     macd, macd_signal, macd_hist, volume_ma20, volume_ratio,
                     is_doji, is_hammer, golden_cross, death_cross,
                     bb_upper_touch, bb_lower_touch)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                        ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
                ON CONFLICT(stock_id, date) DO UPDATE SET
                    ma5 = excluded.ma5, ma10 = excluded.ma10, ma20 = excluded.ma20,
                    ma60 = excluded.ma60, ma120 = excluded.ma120,
                    bb_upper = excluded.bb_upper, bb_middle = excluded.bb_middle,
                    bb_lower = excluded.bb_lower, bb_width = excluded.bb_width,
                    rsi = excluded.rsi,
                    macd = excluded.macd, macd_signal = excluded.macd_signal,
                    macd_hist = excluded.macd_hist,
                    volume_ma20 = excluded.volume_ma20, volume_ratio = excluded.volume_ratio,
                    is_doji = excluded.is_doji, is_hammer = excluded.is_hammer,
                    golden_cross = excluded.golden_cross, death_cross = excluded.death_cross,
                    bb_upper_touch = excluded.bb_upper_touch, bb_lower_touch = excluded.bb_lower_touch
                "#,
            )
            .bind(ind.stock_id)
            .bind(ind.date)
            .bind(ind.ma5)
            .bind(ind.ma10)
            .bind(ind.ma20)
            .bind(ind.ma60)
            .bind(ind.ma120)
            .bind(ind.bb_upper)
            .bind(ind.bb_middle)
            .bind(ind.bb_lower)
            .bind(ind.bb_width)
            .bind(ind.rsi)
            .bind(ind.macd)
            .bind(ind.macd_signal)
            .bind(ind.macd_hist)
            .bind(ind.volume_ma20)
            .bind(ind.volume_ratio)
            .bind(ind.is_doji)
            .bind(ind.is_hammer)
            .bind(ind.golden_cross)
            .bind(ind.death_cross)
            .bind(ind.bb_upper_touch)
            .bind(ind.bb_lower_touch)
            .execute(&mut *tx)
            .await?;
            affected += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(affected)
    }

    pub async fn indicators_for_stock(&self, stock_id: i64) -> Result<Vec<TechnicalIndicator>> {
        let rows = sqlx::query(
            "SELECT * FROM technical_indicators WHERE stock_id = ?1 ORDER BY date ASC",
        )
        .bind(stock_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_indicator).collect()
    }

    /// RSI screening query (served by the rsi index)
    pub async fn indicators_by_rsi_range(
        &self,
        min_rsi: f64,
        max_rsi: f64,
    ) -> Result<Vec<TechnicalIndicator>> {
        let rows = sqlx::query(
            "SELECT * FROM technical_indicators WHERE rsi >= ?1 AND rsi <= ?2 ORDER BY stock_id, date",
        )
        .bind(min_rsi)
        .bind(max_rsi)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_indicator).collect()
    }

    /// Volume-anomaly screening query (served by the volume_ratio index)
    pub async fn indicators_by_volume_ratio(
        &self,
        min_ratio: f64,
    ) -> Result<Vec<TechnicalIndicator>> {
        let rows = sqlx::query(
            "SELECT * FROM technical_indicators WHERE volume_ratio >= ?1 ORDER BY stock_id, date",
        )
        .bind(min_ratio)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_indicator).collect()
    }

    // ---- market tables ----

    pub async fn upsert_market_index(&self, index: &MarketIndex) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO market_indices
                (market, date, open_index, high_index, low_index, close_index,
                 volume, change, change_rate)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(market, date) DO UPDATE SET
                open_index = excluded.open_index,
                high_index = excluded.high_index,
                low_index = excluded.low_index,
                close_index = excluded.close_index,
                volume = excluded.volume,
                change = excluded.change,
                change_rate = excluded.change_rate
            "#,
        )
        .bind(&index.market)
        .bind(index.date)
        .bind(index.open)
        .bind(index.high)
        .bind(index.low)
        .bind(index.close)
        .bind(index.volume)
        .bind(index.change)
        .bind(index.change_rate)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_market_stat(&self, stat: &MarketStat) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO market_stats
                (market, date, rising_stocks, falling_stocks, unchanged_stocks,
                 total_stocks, total_volume, total_value)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(market, date) DO UPDATE SET
                rising_stocks = excluded.rising_stocks,
                falling_stocks = excluded.falling_stocks,
                unchanged_stocks = excluded.unchanged_stocks,
                total_stocks = excluded.total_stocks,
                total_volume = excluded.total_volume,
                total_value = excluded.total_value
            "#,
        )
        .bind(&stat.market)
        .bind(stat.date)
        .bind(stat.rising_stocks)
        .bind(stat.falling_stocks)
        .bind(stat.unchanged_stocks)
        .bind(stat.total_stocks)
        .bind(stat.total_volume)
        .bind(stat.total_value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_market_stat(
        &self,
        market: &str,
        date: NaiveDate,
    ) -> Result<Option<MarketStat>> {
        let row = sqlx::query("SELECT * FROM market_stats WHERE market = ?1 AND date = ?2")
            .bind(market)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_market_stat(&r)).transpose()
    }

    // ---- status ----

    pub async fn stats(&self) -> Result<StoreStats> {
        let stocks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stocks")
            .fetch_one(&self.pool)
            .await?;
        let prices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_prices")
            .fetch_one(&self.pool)
            .await?;
        let indicators: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM technical_indicators")
            .fetch_one(&self.pool)
            .await?;
        let market_stats: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM market_stats")
            .fetch_one(&self.pool)
            .await?;
        let date_range = sqlx::query_as::<_, (Option<NaiveDate>, Option<NaiveDate>)>(
            "SELECT MIN(date), MAX(date) FROM daily_prices",
        )
        .fetch_one(&self.pool)
        .await?;
        let date_range = date_range.0.zip(date_range.1);

        Ok(StoreStats {
            stocks,
            prices,
            indicators,
            market_stats,
            date_range,
        })
    }
}

/// Rows removed by an explicit cascade delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeReport {
    pub prices_deleted: u64,
    pub indicators_deleted: u64,
}

/// Row counts and coverage for the status command
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub stocks: i64,
    pub prices: i64,
    pub indicators: i64,
    pub market_stats: i64,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

// ---- row mapping ----

fn db_err(e: sqlx::Error) -> AppError {
    AppError::Database(e.to_string())
}

fn row_to_stock(row: &SqliteRow) -> Result<Stock> {
    Ok(Stock {
        stock_id: row.try_get("stock_id").map_err(db_err)?,
        symbol: row.try_get("symbol").map_err(db_err)?,
        exchange_code: row.try_get("exchange_code").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        market: row.try_get("market").map_err(db_err)?,
        sector: row.try_get("sector").map_err(db_err)?,
        industry: row.try_get("industry").map_err(db_err)?,
        listing_date: row.try_get("listing_date").map_err(db_err)?,
        delisting_date: row.try_get("delisting_date").map_err(db_err)?,
        is_active: row.try_get("is_active").map_err(db_err)?,
    })
}

fn row_to_daily_price(row: &SqliteRow) -> Result<DailyPrice> {
    Ok(DailyPrice {
        stock_id: row.try_get("stock_id").map_err(db_err)?,
        date: row.try_get("date").map_err(db_err)?,
        open: row.try_get("open_price").map_err(db_err)?,
        high: row.try_get("high_price").map_err(db_err)?,
        low: row.try_get("low_price").map_err(db_err)?,
        close: row.try_get("close_price").map_err(db_err)?,
        adjusted_close: row.try_get("adjusted_close").map_err(db_err)?,
        volume: row.try_get("volume").map_err(db_err)?,
        change: row.try_get("change").map_err(db_err)?,
        change_rate: row.try_get("change_rate").map_err(db_err)?,
    })
}

fn row_to_indicator(row: &SqliteRow) -> Result<TechnicalIndicator> {
    Ok(TechnicalIndicator {
        stock_id: row.try_get("stock_id").map_err(db_err)?,
        date: row.try_get("date").map_err(db_err)?,
        ma5: row.try_get("ma5").map_err(db_err)?,
        ma10: row.try_get("ma10").map_err(db_err)?,
        ma20: row.try_get("ma20").map_err(db_err)?,
        ma60: row.try_get("ma60").map_err(db_err)?,
        ma120: row.try_get("ma120").map_err(db_err)?,
        bb_upper: row.try_get("bb_upper").map_err(db_err)?,
        bb_middle: row.try_get("bb_middle").map_err(db_err)?,
        bb_lower: row.try_get("bb_lower").map_err(db_err)?,
        bb_width: row.try_get("bb_width").map_err(db_err)?,
        rsi: row.try_get("rsi").map_err(db_err)?,
        macd: row.try_get("macd").map_err(db_err)?,
        macd_signal: row.try_get("macd_signal").map_err(db_err)?,
        macd_hist: row.try_get("macd_hist").map_err(db_err)?,
        volume_ma20: row.try_get("volume_ma20").map_err(db_err)?,
        volume_ratio: row.try_get("volume_ratio").map_err(db_err)?,
        is_doji: row.try_get("is_doji").map_err(db_err)?,
        is_hammer: row.try_get("is_hammer").map_err(db_err)?,
        golden_cross: row.try_get("golden_cross").map_err(db_err)?,
        death_cross: row.try_get("death_cross").map_err(db_err)?,
        bb_upper_touch: row.try_get("bb_upper_touch").map_err(db_err)?,
        bb_lower_touch: row.try_get("bb_lower_touch").map_err(db_err)?,
    })
}

fn row_to_market_stat(row: &SqliteRow) -> Result<MarketStat> {
    Ok(MarketStat {
        market: row.try_get("market").map_err(db_err)?,
        date: row.try_get("date").map_err(db_err)?,
        rising_stocks: row.try_get("rising_stocks").map_err(db_err)?,
        falling_stocks: row.try_get("falling_stocks").map_err(db_err)?,
        unchanged_stocks: row.try_get("unchanged_stocks").map_err(db_err)?,
        total_stocks: row.try_get("total_stocks").map_err(db_err)?,
        total_volume: row.try_get("total_volume").map_err(db_err)?,
        total_value: row.try_get("total_value").map_err(db_err)?,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use crate::models::Stock;

    /// Throwaway store backed by a tempdir database file
    pub async fn open_temp_store() -> (TempDir, StockStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StockStore::open(&dir.path().join("test.db")).await.unwrap();
        store.define_schema().await.unwrap();
        (dir, store)
    }

    pub fn sample_stock(symbol: &str, market: &str) -> Stock {
        Stock {
            stock_id: 0,
            symbol: symbol.to_string(),
            exchange_code: None,
            name: format!("{} Corp", symbol),
            market: market.to_string(),
            sector: Some("Technology".to_string()),
            industry: None,
            listing_date: NaiveDate::from_ymd_opt(2015, 1, 2),
            delisting_date: None,
            is_active: true,
        }
    }

    /// Flat bar: open/high/low/close all at `close`, fixed volume
    pub fn flat_bar(stock_id: i64, date: NaiveDate, close: f64) -> DailyPrice {
        DailyPrice {
            stock_id,
            date,
            open: close,
            high: close,
            low: close,
            close,
            adjusted_close: Some(close),
            volume: 1_000,
            change: Some(0.0),
            change_rate: Some(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let (_dir, store) = open_temp_store().await;
        // Second call must not fail on existing tables/indexes
        store.define_schema().await.unwrap();
        store.close().await;
    }

    #[tokio::test]
    async fn test_price_upsert_by_natural_key() {
        let (_dir, store) = open_temp_store().await;
        let id = store.upsert_stock(&sample_stock("AAA", "KOSPI")).await.unwrap();

        let d = date(2024, 1, 5);
        store.upsert_daily_prices(&[flat_bar(id, d, 100.0)]).await.unwrap();
        // Late correction: same natural key, new close
        let mut corrected = flat_bar(id, d, 105.0);
        corrected.change = Some(5.0);
        store.upsert_daily_prices(&[corrected]).await.unwrap();

        let history = store.price_history(id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].close, 105.0);
    }

    #[tokio::test]
    async fn test_upsert_stock_returns_stable_id() {
        let (_dir, store) = open_temp_store().await;
        let first = store.upsert_stock(&sample_stock("BBB", "KOSPI")).await.unwrap();
        let second = store.upsert_stock(&sample_stock("BBB", "KOSDAQ")).await.unwrap();
        assert_eq!(first, second);

        let stock = store.get_stock_by_symbol("BBB").await.unwrap().unwrap();
        assert_eq!(stock.market, "KOSDAQ");
    }

    #[tokio::test]
    async fn test_cascade_delete_removes_dependents() {
        let (_dir, store) = open_temp_store().await;
        let id = store.upsert_stock(&sample_stock("CCC", "KOSPI")).await.unwrap();

        let bars: Vec<_> = (1..=5)
            .map(|day| flat_bar(id, date(2024, 2, day), 100.0 + day as f64))
            .collect();
        store.upsert_daily_prices(&bars).await.unwrap();
        let rows: Vec<_> = bars
            .iter()
            .map(|b| crate::models::TechnicalIndicator::empty(id, b.date))
            .collect();
        store.upsert_indicators(&rows).await.unwrap();

        let report = store.delete_stock(id).await.unwrap();
        assert_eq!(report.prices_deleted, 5);
        assert_eq!(report.indicators_deleted, 5);
        assert!(store.price_history(id).await.unwrap().is_empty());
        assert!(store.indicators_for_stock(id).await.unwrap().is_empty());
        assert!(store.get_stock_by_symbol("CCC").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_stock_is_not_found() {
        let (_dir, store) = open_temp_store().await;
        assert!(matches!(
            store.delete_stock(9999).await,
            Err(crate::error::AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_screening_queries() {
        let (_dir, store) = open_temp_store().await;
        let id = store.upsert_stock(&sample_stock("DDD", "KOSPI")).await.unwrap();

        let mut oversold = crate::models::TechnicalIndicator::empty(id, date(2024, 3, 4));
        oversold.rsi = Some(22.0);
        oversold.volume_ratio = Some(0.8);
        let mut spiking = crate::models::TechnicalIndicator::empty(id, date(2024, 3, 5));
        spiking.rsi = Some(71.0);
        spiking.volume_ratio = Some(3.5);
        store.upsert_indicators(&[oversold, spiking]).await.unwrap();

        let low_rsi = store.indicators_by_rsi_range(0.0, 30.0).await.unwrap();
        assert_eq!(low_rsi.len(), 1);
        assert_eq!(low_rsi[0].date, date(2024, 3, 4));

        let anomalies = store.indicators_by_volume_ratio(2.0).await.unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].date, date(2024, 3, 5));
    }

    #[tokio::test]
    async fn test_market_index_upsert_by_natural_key() {
        let (_dir, store) = open_temp_store().await;
        let d = date(2024, 4, 1);
        let mut index = crate::models::MarketIndex {
            market: "KOSPI".to_string(),
            date: d,
            open: 2700.0,
            high: 2725.0,
            low: 2690.0,
            close: 2710.0,
            volume: 450_000_000,
            change: Some(12.0),
            change_rate: Some(0.0044),
        };
        store.upsert_market_index(&index).await.unwrap();
        // Late correction overwrites in place
        index.close = 2712.0;
        store.upsert_market_index(&index).await.unwrap();

        let close: f64 = sqlx::query_scalar(
            "SELECT close_index FROM market_indices WHERE market = 'KOSPI' AND date = ?1",
        )
        .bind(d)
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(close, 2712.0);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM market_indices")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_market_date_scoping() {
        let (_dir, store) = open_temp_store().await;
        let kospi = store.upsert_stock(&sample_stock("EEE", "KOSPI")).await.unwrap();
        let kosdaq = store.upsert_stock(&sample_stock("FFF", "KOSDAQ")).await.unwrap();

        let d = date(2024, 4, 1);
        store
            .upsert_daily_prices(&[flat_bar(kospi, d, 10.0), flat_bar(kosdaq, d, 20.0)])
            .await
            .unwrap();

        let rows = store.prices_for_market_date("KOSPI", d).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stock_id, kospi);
        assert_eq!(store.market_dates("KOSDAQ").await.unwrap(), vec![d]);
    }
}
