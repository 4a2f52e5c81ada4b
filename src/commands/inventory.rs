use crate::error::{ErrorKind, Result};
use cairn_glacier::Connection;
use cairn_model::{Hashed, Identifiable};
use exn::ResultExt;
use std::io::Write;

/// Start an inventory job. Its output is usually ready hours later.
pub async fn retrieve(connection: &Connection) -> Result<()> {
    tracing::info!("Running retrieve job on inventory");
    let job = connection.create_inventory_job().await.map_err(|err| err.raise(ErrorKind::Vault))?;
    tracing::info!(job_id = %job.id, status = %job.status, "Created inventory job");
    Ok(())
}

/// Wait for the newest inventory job and print its raw payload.
pub async fn print(connection: &Connection, out: &mut impl Write) -> Result<()> {
    tracing::info!("Printing inventory");
    let content = connection.inventory_content().await.map_err(|err| err.raise(ErrorKind::Vault))?;
    writeln!(out, "{content}").or_raise(|| ErrorKind::Output)?;
    Ok(())
}

/// Delete every archive in the newest inventory.
///
/// `confirmation` must equal the configured vault name, otherwise nothing is
/// contacted. Returns the number of archives deleted.
pub async fn purge(connection: &Connection, vault_name: &str, confirmation: &str) -> Result<usize> {
    if vault_name != confirmation {
        exn::bail!(ErrorKind::Unconfirmed {
            expected: vault_name.to_string(),
            given: confirmation.to_string(),
        });
    }
    let archives = connection.list_all_archives().await.map_err(|err| err.raise(ErrorKind::Vault))?;
    tracing::warn!(vault = vault_name, archives = archives.len(), "Deleting all archives in vault");
    for archive in &archives {
        tracing::debug!(path = archive.path(), archive_id = archive.archive_id(), "Deleting archive");
        connection.delete(archive.archive_id()).await.map_err(|err| err.raise(ErrorKind::Vault))?;
    }
    Ok(archives.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::connect;
    use cairn_glacier::Inventory;
    use cairn_glacier::client::{JobKind, MockClient};

    #[tokio::test]
    async fn test_retrieve_creates_inventory_job() {
        let (client, connection) = connect(MockClient::default());
        retrieve(&connection).await.unwrap();
        let jobs = client.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind, JobKind::InventoryRetrieval);
    }

    #[tokio::test]
    async fn test_print_writes_raw_inventory() {
        let (_, connection) = connect(MockClient::default().with_archive("a.txt", "h1", b"a".to_vec()));
        let mut out = Vec::new();
        let err = print(&connection, &mut out).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Vault));

        retrieve(&connection).await.unwrap();
        print(&connection, &mut out).await.unwrap();
        let inventory = Inventory::from_slice(&out).unwrap();
        assert_eq!(inventory.files().len(), 1);
        assert_eq!(inventory.files()[0].path(), "a.txt");
    }

    #[tokio::test]
    async fn test_purge_requires_vault_name() {
        let (client, connection) = connect(
            MockClient::default()
                .with_archive("a.txt", "h1", b"a".to_vec())
                .with_archive("b.txt", "h2", b"b".to_vec()),
        );
        let err = purge(&connection, "photos", "videos").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unconfirmed { .. }));
        assert_eq!(client.total_calls(), 0);

        retrieve(&connection).await.unwrap();
        assert_eq!(purge(&connection, "photos", "photos").await.unwrap(), 2);
        assert!(client.archives().is_empty());
    }
}
