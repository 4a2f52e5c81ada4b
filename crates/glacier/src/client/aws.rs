//! AWS Glacier vault client.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file (or its
//! environment overrides), never via the SDK's default provider chain.

use crate::client::{GlacierClient, Job, JobKind, JobPage, JobRequest, JobStatus};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use aws_sdk_glacier::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    primitives::ByteStream,
    types::{ActionCode, JobParameters, StatusCode},
};
use cairn_model::{BoxAsyncRead, FileWithContent, Hashed};
use exn::{OptionExt, ResultExt};
use tokio::io::AsyncReadExt;

/// Account id placeholder meaning "the account owning the credentials".
const CURRENT_ACCOUNT: &str = "-";

/// [`GlacierClient`] bound to one vault of one account.
#[derive(Debug, Clone)]
pub struct AwsClient {
    client: Client,
    account_id: String,
    vault_name: String,
}

impl AwsClient {
    /// Create a new vault client.
    ///
    /// # Arguments
    /// * `account_id` - AWS account id owning the vault; empty means the
    ///   account of the credentials
    /// * `vault_name` - Name of the vault
    /// * `region` - AWS region of the vault
    /// * `endpoint` - Custom endpoint URL (local test doubles, proxies)
    /// * `key_id` - AWS access key ID
    /// * `key_secret` - AWS secret access key
    pub fn new(
        account_id: impl Into<String>,
        vault_name: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        let mut account_id = account_id.into();
        if account_id.is_empty() {
            account_id = CURRENT_ACCOUNT.to_string();
        }
        let credentials = Credentials::new(key_id, key_secret, None, None, "cairn-config");
        let mut config_builder = aws_sdk_glacier::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // 1 initial attempt + 3 retries with exponential backoff
            .retry_config(RetryConfig::standard().with_max_attempts(4));
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self {
            client: Client::from_conf(config_builder.build()),
            account_id,
            vault_name: vault_name.into(),
        }
    }

    fn job_kind(action: Option<&ActionCode>) -> JobKind {
        match action {
            Some(ActionCode::InventoryRetrieval) => JobKind::InventoryRetrieval,
            Some(ActionCode::ArchiveRetrieval) => JobKind::ArchiveRetrieval,
            _ => JobKind::Other,
        }
    }

    /// A job without a status code has not been picked up yet.
    fn job_status(status: Option<&StatusCode>) -> JobStatus {
        match status {
            Some(StatusCode::Succeeded) => JobStatus::Succeeded,
            Some(StatusCode::Failed) => JobStatus::Failed,
            _ => JobStatus::InProgress,
        }
    }
}

/// `GlacierJobDescription` (list) and `DescribeJobOutput` (describe) carry
/// the same fields but are distinct types.
macro_rules! job_from_description {
    ($description:expr) => {{
        let description = $description;
        Ok(Job {
            id: description.job_id().ok_or_raise(|| ErrorKind::InvalidResponse("JobId"))?.to_string(),
            kind: AwsClient::job_kind(description.action()),
            status: AwsClient::job_status(description.status_code()),
            status_message: description.status_message().map(str::to_string),
            description: description.job_description().map(str::to_string),
            archive_id: description.archive_id().map(str::to_string),
            creation_date: description.creation_date().map(str::to_string),
        })
    }};
}

#[async_trait]
impl GlacierClient for AwsClient {
    async fn delete_archive(&self, archive_id: &str) -> Result<()> {
        self.client
            .delete_archive()
            .account_id(&self.account_id)
            .vault_name(&self.vault_name)
            .archive_id(archive_id)
            .send()
            .await
            .or_raise(|| ErrorKind::Remote("DeleteArchive"))?;
        Ok(())
    }

    async fn upload_archive(&self, file: &dyn FileWithContent) -> Result<String> {
        let body = match file.local_path() {
            // Streamed from disk, and re-readable when the request is retried.
            Some(path) => ByteStream::from_path(path)
                .await
                .or_raise(|| ErrorKind::Content(file.path().to_string()))?,
            None => {
                let mut body = Vec::new();
                file.content()
                    .await
                    .or_raise(|| ErrorKind::Content(file.path().to_string()))?
                    .read_to_end(&mut body)
                    .await
                    .or_raise(|| ErrorKind::Content(file.path().to_string()))?;
                ByteStream::from(body)
            },
        };
        let output = self
            .client
            .upload_archive()
            .account_id(&self.account_id)
            .vault_name(&self.vault_name)
            .archive_description(file.path())
            .checksum(file.hash())
            .body(body)
            .send()
            .await
            .or_raise(|| ErrorKind::Remote("UploadArchive"))?;
        Ok(output.archive_id().ok_or_raise(|| ErrorKind::InvalidResponse("ArchiveId"))?.to_string())
    }

    async fn list_jobs(&self, marker: Option<&str>) -> Result<JobPage> {
        let output = self
            .client
            .list_jobs()
            .account_id(&self.account_id)
            .vault_name(&self.vault_name)
            .set_marker(marker.map(str::to_string))
            .send()
            .await
            .or_raise(|| ErrorKind::Remote("ListJobs"))?;
        let jobs = output
            .job_list()
            .iter()
            .map(|description| job_from_description!(description))
            .collect::<Result<Vec<_>>>()?;
        Ok(JobPage {
            jobs,
            marker: output.marker().map(str::to_string),
        })
    }

    async fn initiate_job(&self, request: JobRequest) -> Result<String> {
        let parameters = match request {
            JobRequest::Inventory { description } => JobParameters::builder()
                .r#type("inventory-retrieval")
                .format("JSON")
                .description(description)
                .build(),
            JobRequest::Archive {
                archive_id,
                description,
                tier,
            } => JobParameters::builder()
                .r#type("archive-retrieval")
                .archive_id(archive_id)
                .description(description)
                .tier(tier.as_str())
                .build(),
        };
        let output = self
            .client
            .initiate_job()
            .account_id(&self.account_id)
            .vault_name(&self.vault_name)
            .job_parameters(parameters)
            .send()
            .await
            .or_raise(|| ErrorKind::Remote("InitiateJob"))?;
        Ok(output.job_id().ok_or_raise(|| ErrorKind::InvalidResponse("JobId"))?.to_string())
    }

    async fn describe_job(&self, job_id: &str) -> Result<Job> {
        let output = self
            .client
            .describe_job()
            .account_id(&self.account_id)
            .vault_name(&self.vault_name)
            .job_id(job_id)
            .send()
            .await
            .or_raise(|| ErrorKind::Remote("DescribeJob"))?;
        job_from_description!(&output)
    }

    async fn get_job_output(&self, job_id: &str) -> Result<BoxAsyncRead> {
        let output = self
            .client
            .get_job_output()
            .account_id(&self.account_id)
            .vault_name(&self.vault_name)
            .job_id(job_id)
            .send()
            .await
            .or_raise(|| ErrorKind::Remote("GetJobOutput"))?;
        Ok(Box::pin(output.body.into_async_read()))
    }
}
