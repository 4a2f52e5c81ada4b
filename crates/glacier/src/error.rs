//! Archive Connection Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A connection error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for connection operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
///
/// ### Transport Errors
/// - [`ErrorKind::Remote`] - the service call failed; retrying may help.
///
/// ### Integrity Errors
/// - [`ErrorKind::Decode`] - the service returned something unreadable.
/// - [`ErrorKind::InvalidResponse`] - the service omitted a required field.
///
/// ### Contract Errors
/// - [`ErrorKind::NoJob`] / [`ErrorKind::NoInventoryJob`] - create the job
///   first, then come back later.
/// - [`ErrorKind::JobFailed`] - the remote job ended in failure.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A call to the archive service failed. Carries the operation name.
    #[display("archive service call failed: {_0}")]
    Remote(#[error(not(source))] &'static str),
    /// The archive service answered without a field it must always return.
    #[display("invalid response from archive service: missing {_0}")]
    InvalidResponse(#[error(not(source))] &'static str),
    /// A remote job finished with status `Failed`.
    #[display("job failed: {_0}")]
    JobFailed(#[error(not(source))] String),
    /// An inventory payload could not be decoded.
    #[display("unsupported inventory format")]
    Decode,
    /// There is no retrieval job for this archive yet.
    #[display("no retrieval job for {path} ({archive_id})")]
    NoJob {
        #[error(not(source))]
        path: String,
        #[error(not(source))]
        archive_id: String,
    },
    /// There are no running or completed inventory jobs.
    #[display("no inventory job found")]
    NoInventoryJob,
    /// Committing to the index failed.
    #[display("index commit failed")]
    Index,
    /// Local content of a file could not be read.
    #[display("unable to read content of {_0}")]
    Content(#[error(not(source))] String),
    /// A retrieval tier name that the service does not know.
    #[display("unknown retrieval tier: {_0}")]
    UnknownTier(#[error(not(source))] String),
    /// Waiting was interrupted by the cancellation token.
    #[display("cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}
