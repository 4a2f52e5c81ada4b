//! Command Error Types
//!
//! Every command failure is raised as one of these kinds on top of the error
//! tree of the crate it came from.

use derive_more::{Display, Error};

/// A command error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for commands.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("unable to initialise logging")]
    Logging,
    /// This build has no archive service backend compiled in.
    #[display("no archive service backend available; build with the `aws` feature")]
    NoBackend,
    #[display("unable to read the local tree")]
    Volume,
    #[display("unable to read or update the index")]
    Index,
    #[display("archive vault operation failed")]
    Vault,
    /// No inventory job exists and creating one was not allowed.
    #[display("inventory job is missing")]
    InventoryJobMissing,
    /// A destructive operation was not confirmed with the vault name.
    #[display("unsafe operation: vault name doesn't match {expected} != {given}")]
    Unconfirmed {
        #[error(not(source))]
        expected: String,
        #[error(not(source))]
        given: String,
    },
    /// Writing command output failed.
    #[display("unable to write output")]
    Output,
}
