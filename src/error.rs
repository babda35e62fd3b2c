use crate::models::ProductId;

#[derive(Debug, thiserror::Error)]
pub enum ApniListError {
    #[error("Invalid price: {0} (prices must be finite and non-negative)")]
    InvalidPrice(f64),

    #[error("Not signed in: remote wishlist requires an authenticated user")]
    Unauthenticated,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(
        "Wishlist migration incomplete: {} product(s) failed to migrate ({}); {} migrated",
        .failed.len(),
        join_ids(.failed),
        .migrated.len()
    )]
    PartialReconciliation {
        failed: Vec<ProductId>,
        migrated: Vec<ProductId>,
    },

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ApniListError {
    /// Whether the failure is a transient persistence problem worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApniListError::StoreUnavailable(_) | ApniListError::DuckDb(_) | ApniListError::Io(_)
        )
    }
}

fn join_ids(ids: &[ProductId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ApniListError>;
