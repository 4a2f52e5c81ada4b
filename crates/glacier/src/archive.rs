use crate::client::ClientHandle;
use async_trait::async_trait;
use cairn_model::{BoxAsyncRead, FileWithContent, Hashed, Identifiable, IdentifiableHashedFile};
use std::fmt;
use std::io::{Error as IoError, Result as IoResult};

/// An archive whose retrieval job has succeeded.
///
/// The job output is only requested when [`content()`](FileWithContent::content)
/// is called; every call starts a fresh download.
pub struct RetrievedArchive {
    file: IdentifiableHashedFile,
    job_id: String,
    client: ClientHandle,
}
impl RetrievedArchive {
    pub(crate) fn new(file: IdentifiableHashedFile, job_id: impl Into<String>, client: ClientHandle) -> Self {
        Self {
            file,
            job_id: job_id.into(),
            client,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}
impl fmt::Debug for RetrievedArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievedArchive")
            .field("file", &self.file)
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}
impl Hashed for RetrievedArchive {
    fn path(&self) -> &str {
        self.file.path()
    }

    fn hash(&self) -> &str {
        self.file.hash()
    }
}
impl Identifiable for RetrievedArchive {
    fn archive_id(&self) -> &str {
        self.file.archive_id()
    }
}
#[async_trait]
impl FileWithContent for RetrievedArchive {
    async fn content(&self) -> IoResult<BoxAsyncRead> {
        tracing::debug!(job_id = %self.job_id, path = self.file.path(), "Loading output of job");
        self.client.get_job_output(&self.job_id).await.map_err(|err| IoError::other(err.to_string()))
    }
}
