use thiserror::Error;

/// Errors surfaced by a [`super::TupleStore`] implementation.
///
/// Per the error-handling design, every variant here is locally
/// recoverable: callers skip the offending unit of work (a root, a rule,
/// a node transfer) and continue the pipeline.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("relation {0} is not known to the store")]
    SchemaMissing(String),

    #[error("relation {relation} has no column named {column}")]
    ColumnMissing { relation: String, column: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Other(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
