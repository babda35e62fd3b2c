use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const CATALOG_BASE: &str = "https://api.apnilist.in/v1/catalog";

/// Best price within this many percent of the lowest-ever price is a buy signal.
pub const DEFAULT_BUY_THRESHOLD_PERCENT: f64 = 5.0;

/// Suggestion queries shorter than this (in characters, after trimming) match nothing.
pub const MIN_SUGGESTION_QUERY_LEN: usize = 2;

pub const DEFAULT_SUGGESTION_LIMIT: usize = 6;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(50);
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(2);

pub const LOCAL_WISHLIST_FILE: &str = "wishlist.json";
pub const STORE_DB_FILE: &str = "apnilist.duckdb";
pub const CATALOG_DIR: &str = "catalog";

pub fn catalog_files() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("categories", "categories.json"),
        ("products", "products.json.gz"),
    ])
}

pub fn default_data_dir() -> PathBuf {
    if let Some(data) = dirs::data_local_dir() {
        data.join("apnilist-sdk")
    } else {
        PathBuf::from(".apnilist-sdk")
    }
}
