//! Thin client trait over the archive service and its implementations.
//!
//! The [`GlacierClient`] trait is deliberately a one-to-one mirror of the six
//! vault operations the connection needs, with the account id and vault name
//! bound into the implementation. Everything interesting (paging, polling,
//! idempotency) lives in [`Connection`](crate::Connection) so that it can be
//! tested against the [`MockClient`].

#[cfg(feature = "aws")]
mod aws;
#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "aws")]
pub use self::aws::AwsClient;
#[cfg(feature = "mock")]
pub use self::mock::MockClient;
use crate::RetrievalTier;
use crate::error::Result;
use async_trait::async_trait;
use cairn_model::{BoxAsyncRead, FileWithContent};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

pub type ClientHandle = Arc<dyn GlacierClient>;

/// What a remote job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    InventoryRetrieval,
    ArchiveRetrieval,
    /// Any job type this tool never creates (e.g. select jobs).
    Other,
}

/// Remote job state. Jobs are created `InProgress` and end in exactly one of
/// the two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    InProgress,
    Succeeded,
    Failed,
}
impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "InProgress",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }
}
impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Description of a remote job, as last reported by the service.
///
/// Never persisted: jobs are always re-discovered by listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub status_message: Option<String>,
    pub description: Option<String>,
    /// Target archive of an archive retrieval job.
    pub archive_id: Option<String>,
    /// Creation timestamp exactly as the service sent it (RFC 3339 when well
    /// formed).
    pub creation_date: Option<String>,
}
impl Display for Job {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{} {}]", self.id, self.description.as_deref().unwrap_or_default())
    }
}

/// One page of a job listing. A present `marker` means there are more.
#[derive(Debug, Clone, Default)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub marker: Option<String>,
}

/// Parameters of a job to initiate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    /// Retrieve the vault inventory as JSON.
    Inventory { description: String },
    /// Stage an archive for download.
    Archive {
        archive_id: String,
        description: String,
        tier: RetrievalTier,
    },
}

/// The six vault operations the connection is built on.
///
/// Implementations report every failure as
/// [`ErrorKind::Remote`](crate::error::ErrorKind::Remote) (or
/// [`InvalidResponse`](crate::error::ErrorKind::InvalidResponse) when a
/// mandatory field is missing), so retry decisions are uniform.
#[async_trait]
pub trait GlacierClient: Send + Sync {
    async fn delete_archive(&self, archive_id: &str) -> Result<()>;

    /// Upload the content of `file` as a single archive and return its id.
    ///
    /// The archive checksum is `file.hash()` (the hex SHA-256 tree hash) and
    /// its description is `file.path()`. The content is streamed, never
    /// buffered whole, when the file is on local disk.
    async fn upload_archive(&self, file: &dyn FileWithContent) -> Result<String>;

    /// List one page of jobs, starting after `marker`.
    async fn list_jobs(&self, marker: Option<&str>) -> Result<JobPage>;

    /// Initiate a job and return its id.
    async fn initiate_job(&self, request: JobRequest) -> Result<String>;

    async fn describe_job(&self, job_id: &str) -> Result<Job>;

    /// Stream the output of a succeeded job.
    async fn get_job_output(&self, job_id: &str) -> Result<BoxAsyncRead>;
}
