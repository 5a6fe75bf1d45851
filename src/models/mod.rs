mod indicator;
mod market_stat;
mod price;
mod stock;
pub mod indicators;

pub use indicator::TechnicalIndicator;
pub use market_stat::MarketStat;
pub use price::{DailyPrice, MarketIndex};
pub use stock::Stock;

/// One stock's full ordered daily history (ascending by date)
pub type PriceHistory = Vec<DailyPrice>;
