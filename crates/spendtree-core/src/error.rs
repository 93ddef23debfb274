//! Error types for spendtree

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A drill-down target no longer exists in the current analysis
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// The requested navigation is not defined from the current view
    #[error("Cannot {action} from the {state} view")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },

    /// The durable write behind a reclassification failed and was rolled back
    #[error("Reclassify of transaction {tx_id} failed: {reason}")]
    ReclassifyFailed { tx_id: i64, reason: String },

    #[error("Transaction {0} already has a reclassification in flight")]
    ReclassifyInFlight(i64),

    /// An aggregate invariant did not hold after a recompute
    #[error("Inconsistent snapshot: {0}")]
    InconsistentSnapshot(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    /// A transaction or classification source reported a failure
    #[error("Source error: {0}")]
    Source(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
