//! Index Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// An index error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
///
/// ### Integrity Errors
/// - [`ErrorKind::CorruptLog`] - the log cannot be trusted; abort.
///
/// ### Contract Errors
/// - [`ErrorKind::DuplicateChange`] - this change was already committed.
/// - [`ErrorKind::ChangeNotFound`] - there is nothing to delete.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading or appending to the log file failed.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// A log line could not be decoded. Line numbers start at 1.
    #[display("corrupt index log at line {line}")]
    CorruptLog {
        #[error(not(source))]
        line: usize,
    },
    /// A record could not be encoded.
    #[display("unable to encode index record")]
    Encode,
    /// An entry with this path and archive id has already been committed.
    #[display("change already committed: {path} ({archive_id})")]
    DuplicateChange {
        #[error(not(source))]
        path: String,
        #[error(not(source))]
        archive_id: String,
    },
    /// No entry with this path and archive id exists.
    #[display("change not found: {path} ({archive_id})")]
    ChangeNotFound {
        #[error(not(source))]
        path: String,
        #[error(not(source))]
        archive_id: String,
    },
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
