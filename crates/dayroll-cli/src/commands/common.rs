//! Shared helpers for CLI commands.

use chrono::{NaiveDate, NaiveDateTime};
use dayroll_core::Store;

/// Open the default store.
pub fn open_store() -> Result<Store, Box<dyn std::error::Error>> {
    Ok(Store::open_default()?)
}

/// The wall clock, in the operator's local timezone.
pub fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Parse a `YYYY-MM-DD` argument.
pub fn parse_date(s: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM-DD, got '{s}'"))?)
}
