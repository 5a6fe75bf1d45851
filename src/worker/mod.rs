pub mod indicator_worker;

pub use indicator_worker::{run_batch, BatchReport};
