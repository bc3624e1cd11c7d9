//! Error types for pvmap-store

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no entry at {0}")]
    NotFound(String),

    #[error("{0} is not a group")]
    NotAGroup(String),

    #[error("{0} is not a dataset")]
    NotADataset(String),

    #[error("invalid path '{0}'")]
    InvalidPath(String),

    #[error("dataset {path}: shape {shape:?} does not hold {len} values")]
    Shape {
        path: String,
        shape: Vec<usize>,
        len: usize,
    },

    #[error("unrecognized storage document: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not replace target file: {0}")]
    Persist(#[from] tempfile::PersistError),
}
