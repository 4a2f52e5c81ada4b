use crate::connection::Connection;
use crate::error::{ErrorKind, Result};
use cairn_index::ChangeCommitter;
use cairn_model::{Changes, CommitEvent, FileAdded, FileDeleted, Hashed, Identifiable};
use std::fmt;

/// Something that happened while applying a batch of changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Content was uploaded as a new archive.
    Uploaded { path: String, archive_id: String },
    /// Content with an empty checksum was not uploaded.
    Skipped { path: String },
    /// A remote archive was deleted.
    RemoteDeleted { path: String, archive_id: String },
    /// A change was durably committed to the index.
    Committed(CommitEvent),
}
impl fmt::Display for ProcessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uploaded { path, archive_id } => write!(f, "uploaded {path} as {archive_id}"),
            Self::Skipped { path } => write!(f, "skipped {path} (empty)"),
            Self::RemoteDeleted { path, archive_id } => write!(f, "deleted archive {archive_id} of {path}"),
            Self::Committed(event) => write!(f, "committed {} {} {}", event.kind, event.path, event.archive_id),
        }
    }
}

/// Applies [`Changes`] to the vault and commits each success to the index.
///
/// Additions are processed first, then deletions, each in list order.
/// Processing stops at the first failure. Nothing is rolled back: changes
/// committed before the failure stay committed, and an archive uploaded
/// right before a failed commit stays in the vault (it shows up again in the
/// next inventory).
pub struct Processor<'a> {
    connection: &'a Connection,
}
impl<'a> Processor<'a> {
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    pub async fn process(
        &self,
        committer: &mut dyn ChangeCommitter,
        changes: &Changes,
        mut observer: impl FnMut(&ProcessEvent),
    ) -> Result<()> {
        tracing::debug!(
            additions = changes.additions.len(),
            deletions = changes.deletions.len(),
            "Processing changes"
        );
        for addition in &changes.additions {
            self.process_addition(committer, addition, &mut observer).await?;
        }
        for deletion in &changes.deletions {
            self.process_deletion(committer, deletion, &mut observer).await?;
        }
        Ok(())
    }

    async fn process_addition(
        &self,
        committer: &mut dyn ChangeCommitter,
        addition: &FileAdded,
        observer: &mut impl FnMut(&ProcessEvent),
    ) -> Result<()> {
        let archive_id = self.connection.upload(addition.0.as_ref()).await?;
        observer(&if archive_id.is_empty() {
            ProcessEvent::Skipped {
                path: addition.path().to_string(),
            }
        } else {
            ProcessEvent::Uploaded {
                path: addition.path().to_string(),
                archive_id: archive_id.clone(),
            }
        });
        let event = committer.commit_add(&archive_id, addition).map_err(|err| err.raise(ErrorKind::Index))?;
        observer(&ProcessEvent::Committed(event));
        Ok(())
    }

    async fn process_deletion(
        &self,
        committer: &mut dyn ChangeCommitter,
        deletion: &FileDeleted,
        observer: &mut impl FnMut(&ProcessEvent),
    ) -> Result<()> {
        let archive_id = deletion.archive_id();
        if !archive_id.is_empty() {
            self.connection.delete(archive_id).await?;
            observer(&ProcessEvent::RemoteDeleted {
                path: deletion.path().to_string(),
                archive_id: archive_id.to_string(),
            });
        }
        let event = committer.commit_delete(archive_id, deletion).map_err(|err| err.raise(ErrorKind::Index))?;
        observer(&ProcessEvent::Committed(event));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClient;
    use cairn_index::{Entry, Index};
    use cairn_model::{CommitKind, IdentifiableHashedFile, MemoryFile};
    use std::sync::Arc;
    use std::time::Duration;

    fn added(path: &str, hash: &str, body: &[u8]) -> FileAdded {
        FileAdded(MemoryFile::new(path, hash, body.to_vec()).into_handle())
    }

    fn deleted(path: &str, hash: &str, archive_id: &str) -> FileDeleted {
        FileDeleted(IdentifiableHashedFile::new(path, hash, archive_id))
    }

    fn setup(client: MockClient) -> (Arc<MockClient>, Connection) {
        let client = Arc::new(client);
        let connection = Connection::from_handle(client.clone()).with_poll_interval(Duration::ZERO);
        (client, connection)
    }

    #[tokio::test]
    async fn test_process_additions_then_deletions() {
        let (client, connection) = setup(MockClient::default().with_archive("old.txt", "h0", b"old".to_vec()));
        let old_id = client.archives()[0].archive_id.clone();
        let mut index = Index::new([Entry::new("old.txt", "h0", old_id.as_str())]);
        let changes = Changes {
            additions: vec![added("a.txt", "h1", b"a"), added("empty.txt", "", b"")],
            deletions: vec![deleted("old.txt", "h0", &old_id)],
        };

        let mut events = Vec::new();
        Processor::new(&connection).process(&mut index, &changes, |e| events.push(e.clone())).await.unwrap();

        let kinds: Vec<_> = events
            .iter()
            .map(|e| match e {
                ProcessEvent::Uploaded { .. } => "uploaded",
                ProcessEvent::Skipped { .. } => "skipped",
                ProcessEvent::RemoteDeleted { .. } => "remote-deleted",
                ProcessEvent::Committed(c) if c.kind == CommitKind::Added => "committed-add",
                ProcessEvent::Committed(_) => "committed-delete",
            })
            .collect();
        assert_eq!(
            kinds,
            ["uploaded", "committed-add", "skipped", "committed-add", "remote-deleted", "committed-delete"]
        );

        let archives = client.archives();
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].description, "a.txt");
        let live = [
            MemoryFile::new("a.txt", "h1", b"a".to_vec()).into_handle(),
            MemoryFile::new("empty.txt", "", Vec::new()).into_handle(),
        ];
        assert!(index.calculate_changes(&live).is_empty());
        let empty = index.entries().find(|e| e.path() == "empty.txt").unwrap();
        assert_eq!(empty.archive_id(), "");
    }

    #[tokio::test]
    async fn test_deletion_with_empty_id_skips_remote() {
        let (client, connection) = setup(MockClient::default());
        let mut index = Index::new([Entry::new("empty.txt", "", "")]);
        let changes = Changes {
            additions: Vec::new(),
            deletions: vec![deleted("empty.txt", "", "")],
        };
        Processor::new(&connection).process(&mut index, &changes, |_| {}).await.unwrap();
        assert!(index.is_empty());
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure_without_rollback() {
        let (client, connection) = setup(MockClient::default());
        let mut index = Index::new([]);
        let changes = Changes {
            additions: vec![added("a.txt", "h1", b"a"), added("b.txt", "h2", b"b"), added("c.txt", "h3", b"c")],
            deletions: vec![deleted("gone.txt", "h9", "archive-404")],
        };

        let mut uploads = 0;
        let result = Processor::new(&connection)
            .process(&mut index, &changes, |e| {
                if matches!(e, ProcessEvent::Uploaded { .. }) {
                    uploads += 1;
                    if uploads == 2 {
                        client.fail_on("UploadArchive");
                    }
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Remote("UploadArchive")));
        // a and b were uploaded and committed; c failed; the deletion never ran.
        assert_eq!(index.len(), 2);
        assert_eq!(client.archives().len(), 2);
        assert_eq!(client.calls("DeleteArchive"), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_keeps_uploaded_archive() {
        let (client, connection) = setup(MockClient::default());
        let mut index = Index::new([]);
        let changes = Changes {
            additions: Vec::new(),
            deletions: vec![deleted("never-indexed.txt", "h", "")],
        };
        let err = Processor::new(&connection).process(&mut index, &changes, |_| {}).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Index));

        let changes = Changes {
            additions: vec![added("a.txt", "h1", b"a")],
            deletions: Vec::new(),
        };
        let mut index = Index::new([Entry::new("a.txt", "h0", "archive-1")]);
        let err = Processor::new(&connection).process(&mut index, &changes, |_| {}).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Index));
        assert_eq!(client.archives().len(), 1);
    }
}
