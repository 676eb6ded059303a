use thiserror::Error;

/// Errors this crate's own plumbing raises (spec §7's taxonomy, the
/// subset relevant to a local, in-memory virtual filesystem over a
/// scratch-file pool).
#[derive(Debug, Error)]
pub enum RepoFetcherError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("scratch file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}
