//! Query errors.
//!
//! Only structurally invalid queries are errors. Malformed or incomplete
//! records never fail an evaluation; they simply do not match.

use thiserror::Error;

/// A query the caller should never have built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("invalid page size {0}: must be at least 1")]
    InvalidPageSize(u32),

    #[error("invalid page index {0}: pages are numbered from 1")]
    InvalidPageIndex(u32),

    #[error("unknown bucket scheme: {0}")]
    UnknownBucketScheme(String),

    #[error("unknown bucket label '{label}' in scheme '{scheme}'")]
    UnknownBucketLabel { scheme: String, label: String },
}
