//! In-memory vault for testing.

use crate::client::{GlacierClient, Job, JobKind, JobPage, JobRequest, JobStatus};
use crate::error::{ErrorKind, Result};
use crate::inventory::{Inventory, InventoryArchive};
use async_trait::async_trait;
use cairn_model::{BoxAsyncRead, FileWithContent, Hashed};
use exn::ResultExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use tokio::io::AsyncReadExt;

/// Every mock archive and job is created one second after the previous one,
/// starting here, so creation order and creation date always agree.
const EPOCH: i64 = 1_704_067_200; // 2024-01-01T00:00:00Z

struct MockArchive {
    archive: InventoryArchive,
    body: Vec<u8>,
}

struct MockJob {
    job: Job,
    /// Statuses handed out by successive describe calls. The last one sticks.
    script: VecDeque<JobStatus>,
    output: Vec<u8>,
}

struct State {
    archives: Vec<MockArchive>,
    jobs: Vec<MockJob>,
    sequence: i64,
    job_script: Vec<JobStatus>,
    page_size: usize,
    calls: HashMap<&'static str, usize>,
    failures: HashSet<&'static str>,
}
impl State {
    fn next(&mut self) -> (i64, OffsetDateTime) {
        self.sequence += 1;
        let created = OffsetDateTime::UNIX_EPOCH + Duration::seconds(EPOCH + self.sequence);
        (self.sequence, created)
    }
}

/// In-memory [`GlacierClient`] for testing.
///
/// Holds archives and jobs behind a [`Mutex`], counts calls per operation and
/// can be told to fail specific operations. New jobs start `InProgress`;
/// each describe call advances them through the configured status script
/// (by default straight to `Succeeded`).
///
/// Operation names match the service's: `DeleteArchive`, `UploadArchive`,
/// `ListJobs`, `InitiateJob`, `DescribeJob`, `GetJobOutput`.
///
/// # Examples
///
/// ```
/// use cairn_glacier::client::{GlacierClient, JobRequest, JobStatus, MockClient};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = MockClient::default().with_job_script([JobStatus::InProgress, JobStatus::Succeeded]);
/// let id = client.initiate_job(JobRequest::Inventory { description: "test".into() }).await.unwrap();
/// assert_eq!(client.describe_job(&id).await.unwrap().status, JobStatus::InProgress);
/// assert_eq!(client.describe_job(&id).await.unwrap().status, JobStatus::Succeeded);
/// assert_eq!(client.calls("DescribeJob"), 2);
/// # Ok(())
/// # }
/// ```
pub struct MockClient {
    state: Mutex<State>,
}

impl MockClient {
    /// Add an archive as if it had been uploaded.
    pub fn with_archive(self, path: &str, hash: &str, body: impl Into<Vec<u8>>) -> Self {
        {
            let mut state = self.lock();
            let body = body.into();
            let (sequence, created) = state.next();
            state.archives.push(MockArchive {
                archive: InventoryArchive {
                    archive_id: format!("archive-{sequence}"),
                    description: path.to_string(),
                    creation_date: created,
                    size: body.len() as u64,
                    tree_hash: hash.to_string(),
                },
                body,
            });
        }
        self
    }

    /// Add an existing job. Its status never changes and `output` is what
    /// [`get_job_output()`](GlacierClient::get_job_output) returns for it.
    pub fn with_job(self, job: Job, output: impl Into<Vec<u8>>) -> Self {
        self.lock().jobs.push(MockJob {
            job,
            script: VecDeque::new(),
            output: output.into(),
        });
        self
    }

    /// Statuses that newly initiated jobs go through, one per describe call.
    pub fn with_job_script(self, script: impl IntoIterator<Item = JobStatus>) -> Self {
        self.lock().job_script = script.into_iter().collect();
        self
    }

    /// Maximum number of jobs per listing page.
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    /// Make every call to `operation` fail with a remote error.
    pub fn fail_on(&self, operation: &'static str) {
        self.lock().failures.insert(operation);
    }

    /// Let calls to `operation` succeed again.
    pub fn recover(&self, operation: &'static str) {
        self.lock().failures.remove(operation);
    }

    /// Number of calls made to `operation`, failed ones included.
    pub fn calls(&self, operation: &str) -> usize {
        self.lock().calls.get(operation).copied().unwrap_or_default()
    }

    /// Total number of calls made to any operation.
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Current archives, in upload order.
    pub fn archives(&self) -> Vec<InventoryArchive> {
        self.lock().archives.iter().map(|a| a.archive.clone()).collect()
    }

    /// Current jobs, in creation order, with their last described status.
    pub fn jobs(&self) -> Vec<Job> {
        self.lock().jobs.iter().map(|j| j.job.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call, then fail it if asked to.
    fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        *state.calls.entry(operation).or_default() += 1;
        if state.failures.contains(operation) {
            exn::bail!(ErrorKind::Remote(operation));
        }
        Ok(state)
    }

    fn find_job<'a>(state: &'a mut State, job_id: &str, operation: &'static str) -> Result<&'a mut MockJob> {
        match state.jobs.iter_mut().find(|j| j.job.id == job_id) {
            Some(job) => Ok(job),
            None => exn::bail!(ErrorKind::Remote(operation)),
        }
    }
}
impl Default for MockClient {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                archives: Vec::new(),
                jobs: Vec::new(),
                sequence: 0,
                job_script: vec![JobStatus::Succeeded],
                page_size: 50,
                calls: HashMap::new(),
                failures: HashSet::new(),
            }),
        }
    }
}

#[async_trait]
impl GlacierClient for MockClient {
    async fn delete_archive(&self, archive_id: &str) -> Result<()> {
        let mut state = self.enter("DeleteArchive")?;
        let before = state.archives.len();
        state.archives.retain(|a| a.archive.archive_id != archive_id);
        if state.archives.len() == before {
            exn::bail!(ErrorKind::Remote("DeleteArchive"));
        }
        Ok(())
    }

    async fn upload_archive(&self, file: &dyn FileWithContent) -> Result<String> {
        drop(self.enter("UploadArchive")?);
        // Same source the AWS client streams from: the local file when there is one.
        let body = match file.local_path() {
            Some(path) => tokio::fs::read(path).await.or_raise(|| ErrorKind::Content(file.path().to_string()))?,
            None => {
                let mut body = Vec::new();
                file.content()
                    .await
                    .or_raise(|| ErrorKind::Content(file.path().to_string()))?
                    .read_to_end(&mut body)
                    .await
                    .or_raise(|| ErrorKind::Content(file.path().to_string()))?;
                body
            },
        };
        let mut state = self.lock();
        let (sequence, created) = state.next();
        let archive_id = format!("archive-{sequence}");
        state.archives.push(MockArchive {
            archive: InventoryArchive {
                archive_id: archive_id.clone(),
                description: file.path().to_string(),
                creation_date: created,
                size: body.len() as u64,
                tree_hash: file.hash().to_string(),
            },
            body,
        });
        Ok(archive_id)
    }

    async fn list_jobs(&self, marker: Option<&str>) -> Result<JobPage> {
        let state = self.enter("ListJobs")?;
        let start = match marker {
            Some(marker) => match marker.parse::<usize>() {
                Ok(start) => start,
                Err(_) => exn::bail!(ErrorKind::Remote("ListJobs")),
            },
            None => 0,
        };
        let end = (start + state.page_size).min(state.jobs.len());
        let jobs = state.jobs.get(start..end).unwrap_or_default().iter().map(|j| j.job.clone()).collect();
        Ok(JobPage {
            jobs,
            marker: (end < state.jobs.len()).then(|| end.to_string()),
        })
    }

    async fn initiate_job(&self, request: JobRequest) -> Result<String> {
        let mut state = self.enter("InitiateJob")?;
        let (sequence, created) = state.next();
        let id = format!("job-{sequence}");
        let creation_date = created.format(&Rfc3339).ok();
        let (kind, description, archive_id, output) = match request {
            JobRequest::Inventory { description } => {
                let inventory = Inventory {
                    vault_arn: Some("arn:aws:glacier:mock:000000000000:vaults/mock".to_string()),
                    inventory_date: creation_date.clone(),
                    archives: state.archives.iter().map(|a| a.archive.clone()).collect(),
                };
                let output = serde_json::to_vec(&inventory).unwrap_or_default();
                (JobKind::InventoryRetrieval, description, None, output)
            },
            JobRequest::Archive {
                archive_id,
                description,
                tier: _,
            } => {
                let Some(archive) = state.archives.iter().find(|a| a.archive.archive_id == archive_id) else {
                    exn::bail!(ErrorKind::Remote("InitiateJob"));
                };
                let output = archive.body.clone();
                (JobKind::ArchiveRetrieval, description, Some(archive_id), output)
            },
        };
        let script = state.job_script.iter().copied().collect();
        state.jobs.push(MockJob {
            job: Job {
                id: id.clone(),
                kind,
                status: JobStatus::InProgress,
                status_message: None,
                description: Some(description),
                archive_id,
                creation_date,
            },
            script,
            output,
        });
        Ok(id)
    }

    async fn describe_job(&self, job_id: &str) -> Result<Job> {
        let mut state = self.enter("DescribeJob")?;
        let job = Self::find_job(&mut state, job_id, "DescribeJob")?;
        let next = if job.script.len() > 1 {
            job.script.pop_front()
        } else {
            job.script.front().copied()
        };
        if let Some(status) = next {
            job.job.status = status;
            if status == JobStatus::Failed {
                job.job.status_message = Some("scripted failure".to_string());
            }
        }
        Ok(job.job.clone())
    }

    async fn get_job_output(&self, job_id: &str) -> Result<BoxAsyncRead> {
        let mut state = self.enter("GetJobOutput")?;
        let job = Self::find_job(&mut state, job_id, "GetJobOutput")?;
        if job.job.status != JobStatus::Succeeded {
            exn::bail!(ErrorKind::Remote("GetJobOutput"));
        }
        Ok(Box::pin(Cursor::new(job.output.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RetrievalTier;
    use cairn_model::MemoryFile;

    async fn read_output(client: &MockClient, job_id: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        client.get_job_output(job_id).await.unwrap().read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_upload_and_delete() {
        let client = MockClient::default();
        let id = client.upload_archive(&MemoryFile::new("a.txt", "h1", b"data".to_vec())).await.unwrap();
        assert_eq!(client.archives().len(), 1);
        assert_eq!(client.archives()[0].description, "a.txt");
        client.delete_archive(&id).await.unwrap();
        assert!(client.archives().is_empty());
        let err = client.delete_archive(&id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Remote("DeleteArchive")));
    }

    #[tokio::test]
    async fn test_archive_retrieval_outputs_body() {
        let client = MockClient::default().with_archive("a.txt", "h1", b"hello".to_vec());
        let archive_id = client.archives()[0].archive_id.clone();
        let job_id = client
            .initiate_job(JobRequest::Archive {
                archive_id: archive_id.clone(),
                description: "a.txt".to_string(),
                tier: RetrievalTier::Bulk,
            })
            .await
            .unwrap();
        // Output is not available before the job has been seen to succeed.
        assert!(client.get_job_output(&job_id).await.is_err());
        let job = client.describe_job(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.archive_id.as_deref(), Some(archive_id.as_str()));
        assert_eq!(read_output(&client, &job_id).await, b"hello");
    }

    #[tokio::test]
    async fn test_inventory_job_snapshots_archives() {
        let client = MockClient::default().with_archive("a.txt", "h1", b"1".to_vec());
        let job_id = client.initiate_job(JobRequest::Inventory { description: "inv".into() }).await.unwrap();
        client.upload_archive(&MemoryFile::new("b.txt", "h2", b"2".to_vec())).await.unwrap();
        client.describe_job(&job_id).await.unwrap();
        let inventory = Inventory::from_slice(&read_output(&client, &job_id).await).unwrap();
        assert_eq!(inventory.archives.len(), 1);
        assert_eq!(inventory.archives[0].description, "a.txt");
    }

    #[tokio::test]
    async fn test_paging() {
        let client = MockClient::default().with_page_size(2);
        for _ in 0..5 {
            client.initiate_job(JobRequest::Inventory { description: "inv".into() }).await.unwrap();
        }
        let first = client.list_jobs(None).await.unwrap();
        assert_eq!(first.jobs.len(), 2);
        assert_eq!(first.marker.as_deref(), Some("2"));
        let last = client.list_jobs(Some("4")).await.unwrap();
        assert_eq!(last.jobs.len(), 1);
        assert_eq!(last.marker, None);
    }

    #[tokio::test]
    async fn test_failure_injection_counts_calls() {
        let client = MockClient::default();
        client.fail_on("ListJobs");
        assert!(client.list_jobs(None).await.is_err());
        client.recover("ListJobs");
        assert!(client.list_jobs(None).await.is_ok());
        assert_eq!(client.calls("ListJobs"), 2);
        assert_eq!(client.total_calls(), 2);
    }
}
