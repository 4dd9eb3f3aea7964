//! Top-level error taxonomy (§7).
//!
//! Every variant except [`PipelineError::InvariantViolation`] is locally
//! recoverable: the component that hit it skips the offending unit of
//! work (a root, a rule, a node transfer) and the pipeline continues.
//! The lossless-union check after C8 is the one fatal condition.

use thiserror::Error;

use crate::rules::RuleError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize run report: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "lossless-union invariant violated for relation {relation}: {detail}"
    )]
    InvariantViolation { relation: String, detail: String },
}

pub type PipelineResult<T> = Result<T, PipelineError>;
