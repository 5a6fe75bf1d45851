use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::constants::DEFAULT_CONCURRENCY;
use crate::utils::get_database_path;

#[derive(Parser)]
#[command(name = "marketdb")]
#[command(about = "Daily equity bar store with chunked partitioning and technical analytics", long_about = None)]
pub struct Cli {
    /// Database file (defaults to $MARKETDB_PATH or ./marketdb.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create schema and declare partition/compression/retention policies
    Init,
    /// Import daily price bars from a CSV file
    Import {
        /// CSV file with symbol,date,open,high,low,close,volume columns
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Recompute technical indicators
    Compute {
        /// Limit to one ticker symbol
        #[arg(short, long)]
        symbol: Option<String>,
        /// Worker-pool width for the per-stock fan-out
        #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
    /// Compute market breadth statistics
    Aggregate {
        /// Market name (e.g., KOSPI)
        #[arg(short, long)]
        market: String,
        /// Single date (YYYY-MM-DD); omit to walk every date present
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Run the chunk lifecycle maintenance pass
    Maintain,
    /// Show row counts and chunk states
    Status,
    /// Delete a stock and cascade to all its dependent rows
    DeleteStock {
        #[arg(short, long)]
        symbol: String,
    },
}

pub fn run() {
    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(get_database_path);

    match cli.command {
        Commands::Init => commands::init::run(db_path),
        Commands::Import { file } => commands::import::run(db_path, file),
        Commands::Compute { symbol, concurrency } => {
            commands::compute::run(db_path, symbol, concurrency)
        }
        Commands::Aggregate { market, date } => commands::aggregate::run(db_path, market, date),
        Commands::Maintain => commands::maintain::run(db_path),
        Commands::Status => commands::status::run(db_path),
        Commands::DeleteStock { symbol } => commands::delete_stock::run(db_path, symbol),
    }
}
