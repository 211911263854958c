pub mod migrations;
pub mod store;

pub use store::{Store, Tx};

use std::path::PathBuf;

/// Returns the data directory, creating it if it doesn't exist.
///
/// `DAYROLL_DATA_DIR` overrides the default of `~/.dayroll/`.
pub fn data_dir() -> PathBuf {
    let dir = std::env::var_os("DAYROLL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".dayroll")
        });
    std::fs::create_dir_all(&dir).ok();
    dir
}
