//! Rebuilding the index from the vault inventory.

use crate::connection::Connection;
use crate::error::{ErrorKind, Result};
use cairn_index::Index;
use cairn_model::{Hashed, Identifiable};
use tracing::instrument;

impl Connection {
    /// Replace the index content with every archive of the newest inventory.
    ///
    /// All or nothing: if any commit fails the index is cleared again, so it
    /// is never left holding part of the inventory. Returns the number of
    /// archives committed.
    #[instrument(level = "debug", skip_all)]
    pub async fn rebuild_index(&self, index: &mut Index) -> Result<usize> {
        let files = self.list_all_archives().await?;
        tracing::info!(archives = files.len(), "Rebuilding index from inventory");
        index.clear().map_err(|err| err.raise(ErrorKind::Index))?;
        for file in &files {
            if let Err(err) = index.commit_add(file.archive_id(), file) {
                tracing::error!(path = file.path(), archive_id = file.archive_id(), "Failed to add archive to index");
                if let Err(clear_err) = index.clear() {
                    tracing::error!(error = %clear_err.to_string(), "Failed to clear partially rebuilt index");
                }
                return Err(err.raise(ErrorKind::Index));
            }
        }
        Ok(files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClient;
    use cairn_index::error::Result as IndexResult;
    use cairn_index::{Committer, Entry};
    use cairn_model::{Hashed, MemoryFile};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn connection(client: MockClient) -> Connection {
        Connection::from_handle(Arc::new(client)).with_poll_interval(Duration::ZERO)
    }

    /// Accepts `limit` additions, then fails.
    struct FlakyCommitter {
        limit: usize,
        added: AtomicUsize,
        cleared: Arc<AtomicUsize>,
    }
    impl Committer for FlakyCommitter {
        fn add(&self, _entry: &Entry) -> IndexResult<()> {
            if self.added.fetch_add(1, Ordering::SeqCst) >= self.limit {
                exn::bail!(cairn_index::error::ErrorKind::Io(std::io::Error::other("disk full")));
            }
            Ok(())
        }

        fn remove(&self, _entry: &Entry) -> IndexResult<()> {
            Ok(())
        }

        fn clear(&self) -> IndexResult<()> {
            self.cleared.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn vault_with_inventory() -> Connection {
        let connection = connection(
            MockClient::default()
                .with_archive("a.txt", "h1", b"1".to_vec())
                .with_archive("a.txt", "h2", b"2".to_vec())
                .with_archive("b.txt", "h3", b"3".to_vec()),
        );
        connection.create_inventory_job().await.unwrap();
        connection
    }

    #[tokio::test]
    async fn test_rebuild_replaces_index() {
        let connection = vault_with_inventory().await;
        let mut index = Index::new([Entry::new("stale.txt", "h0", "archive-0")]);
        assert_eq!(connection.rebuild_index(&mut index).await.unwrap(), 3);
        assert_eq!(index.len(), 3);
        assert!(index.entries().all(|e| e.path() != "stale.txt"));
        let live = [
            MemoryFile::new("a.txt", "h2", b"2".to_vec()).into_handle(),
            MemoryFile::new("b.txt", "h3", b"3".to_vec()).into_handle(),
        ];
        // The older upload of a.txt is reported for deletion.
        let changes = index.calculate_changes(&live);
        assert!(changes.additions.is_empty());
        assert_eq!(changes.deletions.len(), 1);
        assert_eq!(changes.deletions[0].hash(), "h1");
    }

    #[tokio::test]
    async fn test_rebuild_is_all_or_nothing() {
        let connection = vault_with_inventory().await;
        let cleared = Arc::new(AtomicUsize::new(0));
        let committer = FlakyCommitter {
            limit: 2,
            added: AtomicUsize::new(0),
            cleared: cleared.clone(),
        };
        let mut index = Index::with_committer(committer, [Entry::new("stale.txt", "h0", "archive-0")]);
        let err = connection.rebuild_index(&mut index).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Index));
        assert!(index.is_empty());
        assert_eq!(cleared.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rebuild_without_inventory_leaves_index() {
        let connection = connection(MockClient::default());
        let mut index = Index::new([Entry::new("kept.txt", "h0", "archive-0")]);
        let err = connection.rebuild_index(&mut index).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoInventoryJob));
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_rebuild_durable_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".changes.log");
        let connection = vault_with_inventory().await;
        let mut index = Index::load(&path).unwrap();
        connection.rebuild_index(&mut index).await.unwrap();
        let reloaded = Index::load(&path).unwrap();
        assert_eq!(reloaded.len(), 3);
    }
}
