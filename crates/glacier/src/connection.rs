use crate::archive::RetrievedArchive;
use crate::client::{ClientHandle, GlacierClient, Job, JobKind, JobRequest, JobStatus};
use crate::error::{ErrorKind, Result};
use crate::inventory::Inventory;
use crate::tier::RetrievalTier;
use cairn_model::{FileWithContent, Hashed, Identifiable, IdentifiableHashedFile};
use exn::ResultExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const INVENTORY_JOB_DESCRIPTION: &str = "Update inventory";

/// Job-oriented operations on one archive vault.
///
/// Wraps a [`GlacierClient`] with the logic the service leaves to callers:
/// following job listing pages, polling jobs to completion and finding an
/// existing job before creating a new one.
#[derive(Clone)]
pub struct Connection {
    client: ClientHandle,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Connection {
    pub fn new(client: impl GlacierClient + 'static) -> Self {
        Self::from_handle(Arc::new(client))
    }

    pub fn from_handle(client: ClientHandle) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel: CancellationToken::new(),
        }
    }

    /// How long to sleep between two describe calls while a job is running.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Replace the token that aborts [`await_completion()`](Self::await_completion).
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Upload the file as a new archive and return the archive id.
    ///
    /// Files with an empty hash (empty content) are never uploaded: the
    /// returned id is empty and the service is not contacted.
    #[instrument(level = "debug", skip_all, fields(path = file.path(), hash = file.hash()))]
    pub async fn upload(&self, file: &dyn FileWithContent) -> Result<String> {
        if file.hash().is_empty() {
            tracing::debug!("Empty checksum, skipping upload");
            return Ok(String::new());
        }
        tracing::debug!(streamed = file.local_path().is_some(), "Uploading archive");
        self.client.upload_archive(file).await
    }

    /// Delete an archive. An empty id is a successful no-op.
    pub async fn delete(&self, archive_id: &str) -> Result<()> {
        if archive_id.is_empty() {
            return Ok(());
        }
        tracing::debug!(archive_id, "Deleting archive");
        self.client.delete_archive(archive_id).await
    }

    async fn create_job(&self, request: JobRequest) -> Result<Job> {
        tracing::debug!(?request, "Creating job");
        let job_id = self.client.initiate_job(request).await?;
        self.describe_job(&job_id).await
    }

    async fn describe_job(&self, job_id: &str) -> Result<Job> {
        tracing::debug!(job_id, "Loading job");
        self.client.describe_job(job_id).await
    }

    /// Ask the service to prepare a fresh inventory of the vault.
    pub async fn create_inventory_job(&self) -> Result<Job> {
        self.create_job(JobRequest::Inventory {
            description: INVENTORY_JOB_DESCRIPTION.to_string(),
        })
        .await
    }

    async fn list_all_jobs(&self) -> Result<Vec<Job>> {
        tracing::debug!("Loading list of all jobs in vault");
        let mut jobs = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let page = self.client.list_jobs(marker.as_deref()).await?;
            jobs.extend(page.jobs);
            match page.marker {
                Some(next) => {
                    tracing::debug!("Loading next page of jobs");
                    marker = Some(next);
                },
                None => return Ok(jobs),
            }
        }
    }

    /// The inventory retrieval job with the latest creation date.
    ///
    /// A job whose creation date is missing or unparsable counts as created
    /// now, so it sorts as newest.
    pub async fn find_newest_inventory_job(&self) -> Result<Option<Job>> {
        let jobs = self.list_all_jobs().await?;
        let mut newest: Option<(OffsetDateTime, Job)> = None;
        for job in jobs.into_iter().filter(|j| j.kind == JobKind::InventoryRetrieval) {
            let created = creation_date(&job);
            if newest.as_ref().is_none_or(|(newest_created, _)| created > *newest_created) {
                newest = Some((created, job));
            }
        }
        Ok(newest.map(|(_, job)| job))
    }

    /// Poll `job` until it leaves `InProgress`.
    ///
    /// There is no timeout: retrieval jobs routinely take hours. Cancelling
    /// the connection's token aborts the wait with
    /// [`Cancelled`](ErrorKind::Cancelled).
    #[instrument(level = "debug", skip_all, fields(job_id = %job.id))]
    pub async fn await_completion(&self, mut job: Job) -> Result<Job> {
        tracing::debug!(status = %job.status, "Checking job status");
        if job.status == JobStatus::InProgress {
            tracing::info!(
                job = %job,
                "Job is in progress, waiting for completion. It is safe to stop and come back to this later"
            );
        }
        while job.status == JobStatus::InProgress {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {},
            }
            job = self.describe_job(&job.id).await?;
            tracing::trace!(status = %job.status, "Polled job");
        }
        if job.status == JobStatus::Failed {
            exn::bail!(ErrorKind::JobFailed(job.status_message.unwrap_or_default()));
        }
        tracing::debug!(job = %job, "Job has finished");
        Ok(job)
    }

    /// Download the whole output of a succeeded job.
    pub async fn get_job_output(&self, job_id: &str) -> Result<Vec<u8>> {
        tracing::debug!(job_id, "Loading output of job");
        let mut output = Vec::new();
        self.client
            .get_job_output(job_id)
            .await?
            .read_to_end(&mut output)
            .await
            .or_raise(|| ErrorKind::Remote("GetJobOutput"))?;
        Ok(output)
    }

    async fn inventory_job_output(&self) -> Result<Vec<u8>> {
        let job = self.find_newest_inventory_job().await?.ok_or_else(|| exn::Exn::from(ErrorKind::NoInventoryJob))?;
        let job = self.await_completion(job).await?;
        self.get_job_output(&job.id).await
    }

    /// Raw payload of the newest inventory, once its job has completed.
    pub async fn inventory_content(&self) -> Result<String> {
        String::from_utf8(self.inventory_job_output().await?).or_raise(|| ErrorKind::Decode)
    }

    /// Decoded newest inventory, once its job has completed.
    pub async fn get_inventory(&self) -> Result<Inventory> {
        Inventory::from_slice(&self.inventory_job_output().await?)
    }

    /// Every archive in the newest inventory, duplicates included.
    pub async fn list_all_archives(&self) -> Result<Vec<IdentifiableHashedFile>> {
        Ok(self.get_inventory().await?.files())
    }

    /// The newest archive per path in the newest inventory.
    pub async fn list_newest_archives_by_path(&self) -> Result<BTreeMap<String, IdentifiableHashedFile>> {
        Ok(self.get_inventory().await?.newest_by_path())
    }

    async fn find_job_for_archive(&self, archive_id: &str) -> Result<Option<Job>> {
        let jobs = self.list_all_jobs().await?;
        Ok(jobs.into_iter().find(|job| job.archive_id.as_deref() == Some(archive_id)))
    }

    /// Create a retrieval job for the file's archive, with the path as the
    /// job description.
    pub async fn create_archive_retrieval_job(
        &self,
        file: &(impl Identifiable + ?Sized),
        tier: RetrievalTier,
    ) -> Result<Job> {
        self.create_job(JobRequest::Archive {
            archive_id: file.archive_id().to_string(),
            description: file.path().to_string(),
            tier,
        })
        .await
    }

    /// Return the job already retrieving this archive, or create one.
    ///
    /// An existing job is returned as listed, whatever its status. Calling
    /// this repeatedly never creates a second job for the same archive.
    pub async fn find_or_create_archive_retrieval_job(
        &self,
        file: &(impl Identifiable + ?Sized),
        tier: RetrievalTier,
    ) -> Result<Job> {
        if let Some(job) = self.find_job_for_archive(file.archive_id()).await? {
            tracing::debug!(job = %job, archive_id = file.archive_id(), "Found existing retrieval job");
            return Ok(job);
        }
        self.create_archive_retrieval_job(file, tier).await
    }

    /// Wait for the file's retrieval job and return a handle on its content.
    ///
    /// Fails with [`NoJob`](ErrorKind::NoJob) when no retrieval job exists:
    /// call [`find_or_create_archive_retrieval_job()`](Self::find_or_create_archive_retrieval_job)
    /// first.
    pub async fn load_content(&self, file: &(impl Identifiable + ?Sized)) -> Result<RetrievedArchive> {
        let Some(job) = self.find_job_for_archive(file.archive_id()).await? else {
            exn::bail!(ErrorKind::NoJob {
                path: file.path().to_string(),
                archive_id: file.archive_id().to_string(),
            });
        };
        let job = self.await_completion(job).await?;
        Ok(RetrievedArchive::new(IdentifiableHashedFile::of(file), job.id, self.client.clone()))
    }
}

fn creation_date(job: &Job) -> OffsetDateTime {
    job.creation_date
        .as_deref()
        .and_then(|date| OffsetDateTime::parse(date, &Rfc3339).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClient;
    use async_trait::async_trait;
    use cairn_model::{BoxAsyncRead, MemoryFile};
    use rstest::rstest;
    use std::io::{Error as IoError, Result as IoResult};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn connection(client: &Arc<MockClient>) -> Connection {
        Connection::from_handle(client.clone()).with_poll_interval(Duration::ZERO)
    }

    fn inventory_job(id: &str, creation_date: Option<&str>) -> Job {
        Job {
            id: id.to_string(),
            kind: JobKind::InventoryRetrieval,
            status: JobStatus::Succeeded,
            status_message: None,
            description: Some(INVENTORY_JOB_DESCRIPTION.to_string()),
            archive_id: None,
            creation_date: creation_date.map(str::to_string),
        }
    }

    fn archive_job(id: &str, archive_id: &str, creation_date: &str) -> Job {
        Job {
            kind: JobKind::ArchiveRetrieval,
            archive_id: Some(archive_id.to_string()),
            ..inventory_job(id, Some(creation_date))
        }
    }

    #[tokio::test]
    async fn test_upload_empty_hash_makes_no_remote_call() {
        let client = Arc::new(MockClient::default());
        let file = MemoryFile::new("empty.txt", "", Vec::new());
        assert_eq!(connection(&client).upload(&file).await.unwrap(), "");
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_upload_uses_hash_and_path() {
        let client = Arc::new(MockClient::default());
        let file = MemoryFile::new("dir/a.txt", "h1", b"abc".to_vec());
        let archive_id = connection(&client).upload(&file).await.unwrap();
        let archives = client.archives();
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].archive_id, archive_id);
        assert_eq!(archives[0].description, "dir/a.txt");
        assert_eq!(archives[0].tree_hash, "h1");
        assert_eq!(archives[0].size, 3);
    }

    /// A file on disk that refuses to be read through a reader.
    struct DiskFile {
        path: PathBuf,
        hash: &'static str,
    }
    impl Hashed for DiskFile {
        fn path(&self) -> &str {
            "disk.bin"
        }

        fn hash(&self) -> &str {
            self.hash
        }
    }
    #[async_trait]
    impl FileWithContent for DiskFile {
        async fn content(&self) -> IoResult<BoxAsyncRead> {
            Err(IoError::other("must be streamed from its path"))
        }

        fn local_path(&self) -> Option<&Path> {
            Some(&self.path)
        }
    }

    /// An in-memory file counting how often its content is opened.
    struct CountingFile {
        inner: MemoryFile,
        opened: AtomicUsize,
    }
    impl Hashed for CountingFile {
        fn path(&self) -> &str {
            self.inner.path()
        }

        fn hash(&self) -> &str {
            self.inner.hash()
        }
    }
    #[async_trait]
    impl FileWithContent for CountingFile {
        async fn content(&self) -> IoResult<BoxAsyncRead> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.inner.content().await
        }
    }

    #[tokio::test]
    async fn test_upload_streams_local_file_from_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.bin");
        std::fs::write(&path, vec![7u8; 3 * 1024]).unwrap();
        let client = Arc::new(MockClient::default());
        let file = DiskFile { path, hash: "h-disk" };

        connection(&client).upload(&file).await.unwrap();
        let archives = client.archives();
        assert_eq!(archives[0].size, 3 * 1024);
        assert_eq!(archives[0].tree_hash, "h-disk");
    }

    #[tokio::test]
    async fn test_upload_reads_in_memory_content_once() {
        let client = Arc::new(MockClient::default());
        let file = CountingFile {
            inner: MemoryFile::new("mem.txt", "h-mem", b"hello".to_vec()),
            opened: AtomicUsize::new(0),
        };
        connection(&client).upload(&file).await.unwrap();
        assert_eq!(file.opened.load(Ordering::SeqCst), 1);
        assert_eq!(client.archives()[0].size, 5);
    }

    #[tokio::test]
    async fn test_upload_unreadable_content() {
        let client = Arc::new(MockClient::default());
        let file = DiskFile {
            path: PathBuf::from("/nonexistent/cairn/disk.bin"),
            hash: "h",
        };
        let err = connection(&client).upload(&file).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Content(path) if path == "disk.bin"));
        assert!(client.archives().is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_is_remote() {
        let client = Arc::new(MockClient::default());
        client.fail_on("UploadArchive");
        let err = connection(&client).upload(&MemoryFile::new("a", "h", b"x".to_vec())).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Remote("UploadArchive")));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_delete_empty_id_is_noop() {
        let client = Arc::new(MockClient::default());
        connection(&client).delete("").await.unwrap();
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_archive() {
        let client = Arc::new(MockClient::default().with_archive("a.txt", "h", b"x".to_vec()));
        let archive_id = client.archives()[0].archive_id.clone();
        connection(&client).delete(&archive_id).await.unwrap();
        assert!(client.archives().is_empty());
    }

    #[tokio::test]
    async fn test_create_inventory_job_describes_it() {
        let client = Arc::new(MockClient::default());
        let job = connection(&client).create_inventory_job().await.unwrap();
        assert_eq!(job.kind, JobKind::InventoryRetrieval);
        assert_eq!(job.description.as_deref(), Some("Update inventory"));
        assert_eq!(client.calls("InitiateJob"), 1);
        assert_eq!(client.calls("DescribeJob"), 1);
    }

    #[tokio::test]
    async fn test_await_completion_polls_until_done() {
        let client = Arc::new(
            MockClient::default().with_job_script([JobStatus::InProgress, JobStatus::InProgress, JobStatus::Succeeded]),
        );
        let job_id = client.initiate_job(JobRequest::Inventory { description: "inv".into() }).await.unwrap();
        let job = client.jobs().into_iter().find(|j| j.id == job_id).unwrap();
        assert_eq!(job.status, JobStatus::InProgress);

        let job = connection(&client).await_completion(job).await.unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(client.calls("DescribeJob"), 3);
    }

    #[tokio::test]
    async fn test_await_completion_does_not_poll_finished_job() {
        let client = Arc::new(MockClient::default());
        let job = connection(&client).await_completion(inventory_job("j", None)).await.unwrap();
        assert_eq!(job.id, "j");
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_await_completion_failed_job() {
        let client = Arc::new(MockClient::default().with_job_script([JobStatus::InProgress, JobStatus::Failed]));
        let connection = connection(&client);
        let job = connection.create_inventory_job().await.unwrap();
        let err = connection.await_completion(job).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::JobFailed(msg) if msg == "scripted failure"));
    }

    #[tokio::test]
    async fn test_await_completion_cancelled() {
        let client = Arc::new(MockClient::default().with_job_script([JobStatus::InProgress]));
        let connection = connection(&client).with_poll_interval(Duration::from_secs(3600));
        let job = connection.create_inventory_job().await.unwrap();
        connection.cancellation_token().cancel();
        let err = connection.await_completion(job).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Cancelled));
        assert_eq!(client.calls("DescribeJob"), 1);
    }

    #[rstest]
    #[case::latest_wins(
        vec![
            inventory_job("old", Some("2024-01-01T00:00:00Z")),
            inventory_job("new", Some("2024-03-01T00:00:00Z")),
            inventory_job("mid", Some("2024-02-01T00:00:00Z")),
        ],
        Some("new")
    )]
    #[case::tie_keeps_first(
        vec![
            inventory_job("first", Some("2024-01-01T00:00:00Z")),
            inventory_job("second", Some("2024-01-01T00:00:00Z")),
        ],
        Some("first")
    )]
    #[case::malformed_date_is_newest(
        vec![
            inventory_job("dated", Some("2024-01-01T00:00:00Z")),
            inventory_job("garbled", Some("last tuesday")),
        ],
        Some("garbled")
    )]
    #[case::missing_date_is_newest(
        vec![inventory_job("undated", None), inventory_job("dated", Some("2024-01-01T00:00:00Z"))],
        Some("undated")
    )]
    #[case::archive_jobs_ignored(
        vec![
            inventory_job("inventory", Some("2024-01-01T00:00:00Z")),
            archive_job("archive", "a1", "2024-06-01T00:00:00Z"),
        ],
        Some("inventory")
    )]
    #[case::none(vec![archive_job("archive", "a1", "2024-06-01T00:00:00Z")], None)]
    #[tokio::test]
    async fn test_find_newest_inventory_job(#[case] jobs: Vec<Job>, #[case] expected: Option<&str>) {
        let client = jobs.into_iter().fold(MockClient::default(), |client, job| client.with_job(job, Vec::new()));
        let client = Arc::new(client);
        let newest = connection(&client).find_newest_inventory_job().await.unwrap();
        assert_eq!(newest.as_ref().map(|j| j.id.as_str()), expected);
    }

    #[tokio::test]
    async fn test_find_newest_inventory_job_follows_pages() {
        let mut client = MockClient::default().with_page_size(2);
        for day in 1..=5 {
            let date = format!("2024-01-0{day}T00:00:00Z");
            client = client.with_job(inventory_job(&format!("job-{day}"), Some(&date)), Vec::new());
        }
        let client = Arc::new(client);
        let newest = connection(&client).find_newest_inventory_job().await.unwrap().unwrap();
        assert_eq!(newest.id, "job-5");
        assert_eq!(client.calls("ListJobs"), 3);
    }

    #[tokio::test]
    async fn test_get_inventory_without_job() {
        let client = Arc::new(MockClient::default());
        let err = connection(&client).get_inventory().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoInventoryJob));
    }

    #[tokio::test]
    async fn test_get_inventory_decode_error() {
        let client = Arc::new(MockClient::default().with_job(inventory_job("j", None), b"{not json".to_vec()));
        let err = connection(&client).get_inventory().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Decode));
    }

    #[tokio::test]
    async fn test_get_inventory_transport_error() {
        let client = Arc::new(MockClient::default().with_job(inventory_job("j", None), b"{}".to_vec()));
        client.fail_on("GetJobOutput");
        let err = connection(&client).get_inventory().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Remote("GetJobOutput")));
    }

    #[tokio::test]
    async fn test_list_archives_from_inventory() {
        let client = Arc::new(
            MockClient::default()
                .with_archive("a.txt", "h1", b"1".to_vec())
                .with_archive("a.txt", "h2", b"2".to_vec())
                .with_archive("b.txt", "h3", b"3".to_vec()),
        );
        let connection = connection(&client);
        connection.create_inventory_job().await.unwrap();

        let all = connection.list_all_archives().await.unwrap();
        assert_eq!(all.len(), 3);
        let newest = connection.list_newest_archives_by_path().await.unwrap();
        assert_eq!(newest.len(), 2);
        assert_eq!(newest["a.txt"].hash(), "h2");

        let raw = connection.inventory_content().await.unwrap();
        assert!(raw.contains("\"ArchiveList\""));
    }

    #[tokio::test]
    async fn test_find_or_create_archive_retrieval_job_is_idempotent() {
        let client = Arc::new(MockClient::default().with_archive("a.txt", "h1", b"data".to_vec()));
        let file = IdentifiableHashedFile::of(&client.archives()[0]);
        let connection = connection(&client);

        let first = connection.find_or_create_archive_retrieval_job(&file, RetrievalTier::Bulk).await.unwrap();
        let second = connection.find_or_create_archive_retrieval_job(&file, RetrievalTier::Bulk).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.description.as_deref(), Some("a.txt"));
        assert_eq!(client.calls("InitiateJob"), 1);
        assert_eq!(client.jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_load_content_without_job() {
        let client = Arc::new(MockClient::default().with_archive("a.txt", "h1", b"data".to_vec()));
        let file = IdentifiableHashedFile::of(&client.archives()[0]);
        let err = connection(&client).load_content(&file).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoJob { path, .. } if path == "a.txt"));
    }

    #[tokio::test]
    async fn test_load_content_after_job() {
        let client = Arc::new(MockClient::default().with_archive("a.txt", "h1", b"data".to_vec()));
        let file = IdentifiableHashedFile::of(&client.archives()[0]);
        let connection = connection(&client);
        connection.find_or_create_archive_retrieval_job(&file, RetrievalTier::Standard).await.unwrap();

        let archive = connection.load_content(&file).await.unwrap();
        assert_eq!(archive.path(), "a.txt");
        assert_eq!(archive.archive_id(), file.archive_id());
        // Content is fetched lazily.
        assert_eq!(client.calls("GetJobOutput"), 0);
        let mut buf = Vec::new();
        archive.content().await.unwrap().read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"data");
        assert_eq!(client.calls("GetJobOutput"), 1);
    }
}
