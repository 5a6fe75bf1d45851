//! Fixed windows and lifecycle thresholds
//!
//! Indicator windows are the classic daily-bar set: five moving averages,
//! a 20-day Bollinger/volume baseline, Wilder RSI(14) and MACD(12,26,9).
//! All of them are hard constants — the derived tables are recomputable,
//! so changing a window only requires a recompute pass, not a migration.

/// Simple moving average windows (trading days)
pub const MA_WINDOWS: [usize; 5] = [5, 10, 20, 60, 120];

/// Bollinger Band window and band width in sample standard deviations
pub const BOLLINGER_WINDOW: usize = 20;
pub const BOLLINGER_K: f64 = 2.0;

/// RSI lookback (Wilder smoothing, needs period + 1 observations)
pub const RSI_PERIOD: usize = 14;

/// MACD fast/slow/signal EMA windows
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Volume baseline window for the volume-ratio anomaly screen
pub const VOLUME_MA_WINDOW: usize = 20;

/// Doji: body no larger than this fraction of the day's range
pub const DOJI_BODY_RATIO: f64 = 0.1;

/// Golden/death cross pair (short, long)
pub const CROSS_SHORT_WINDOW: usize = 5;
pub const CROSS_LONG_WINDOW: usize = 20;

/// Chunk lifecycle configuration, in calendar months.
///
/// Every time-series table is partitioned into 1-month chunks; chunks
/// older than one month become read-mostly (compressed), chunks older
/// than three years are dropped.
pub const CHUNK_INTERVAL_MONTHS: u32 = 1;
pub const COMPRESSION_AFTER_MONTHS: u32 = 1;
pub const RETENTION_MONTHS: u32 = 36;

/// Default worker-pool width for the indicator fan-out
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Connection pool head-room above the worker width so the fan-out
/// queues on the pool instead of starving
pub const POOL_EXTRA_CONNECTIONS: u32 = 2;
