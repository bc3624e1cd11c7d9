//! Error types for pvmap-convert

use pvmap_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Conditions that stop a run. Per-entity problems are never raised here;
/// they go to the `ConversionReport`.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("missing mandatory data: {0}")]
    MissingBlock(String),

    #[error("malformed storage: {0}")]
    Malformed(String),

    #[error("unknown analysis type '{0}'")]
    UnknownAnalysis(String),

    #[error("set {set} spans several parts: {}", parts.join(", "))]
    SetContainment { set: String, parts: Vec<String> },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not replace output file: {0}")]
    Persist(#[from] tempfile::PersistError),
}
