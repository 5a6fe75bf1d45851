use chrono::{Datelike, Months, NaiveDate};
use std::path::PathBuf;

use crate::error::{AppError, Result};

/// Get database path from environment variable or use default
pub fn get_database_path() -> PathBuf {
    std::env::var("MARKETDB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("marketdb.db"))
}

/// First day of the calendar month containing `date`.
///
/// Monthly chunks are addressed by their start date, so this is the
/// chunk key for any row date.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .expect("first of month is always a valid date")
}

/// Month-start `months` calendar months before `date`'s month
pub fn months_back(date: NaiveDate, months: u32) -> NaiveDate {
    month_start(date) - Months::new(months)
}

/// Parse a `YYYY-MM-DD` date argument
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| AppError::InvalidInput(format!("invalid date '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_start() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        assert_eq!(month_start(d), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(month_start(month_start(d)), month_start(d));
    }

    #[test]
    fn test_months_back_crosses_year() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(months_back(d, 3), NaiveDate::from_ymd_opt(2023, 11, 1).unwrap());
        assert_eq!(months_back(d, 36), NaiveDate::from_ymd_opt(2021, 2, 1).unwrap());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-01-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
        assert!(parse_date("01/05/2024").is_err());
    }
}
