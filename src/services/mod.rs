pub mod database;
pub mod indicator_engine;
pub mod lifecycle;
pub mod market_aggregator;

pub use database::{CascadeReport, StockStore, StoreStats};
pub use lifecycle::{MaintenanceReport, PolicyOutcome};
