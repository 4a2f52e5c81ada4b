use crate::cli::InventoryJobArgs;
use crate::commands::Tree;
use crate::error::{ErrorKind, Result};
use cairn_config::VolumeConfig;
use cairn_glacier::client::JobStatus;
use cairn_glacier::{Connection, RetrievalTier};
use cairn_model::{Hashed, Identifiable, IdentifiableHashedFile};
use exn::ResultExt;
use std::path::Path;

/// Rebuild the index log from the newest vault inventory.
///
/// Without an inventory job one is created first, unless `options` asks to
/// fail instead. Forcing creates a new job even when one exists. Returns the
/// number of archives in the rebuilt index.
pub async fn index(root: &Path, config: &VolumeConfig, connection: &Connection, options: InventoryJobArgs) -> Result<usize> {
    tracing::info!("Recovering index from inventory");
    let newest = connection.find_newest_inventory_job().await.map_err(|err| err.raise(ErrorKind::Vault))?;
    match newest {
        _ if options.force_create_inventory_job => {
            connection.create_inventory_job().await.map_err(|err| err.raise(ErrorKind::Vault))?;
        },
        None if options.skip_create_inventory_job => exn::bail!(ErrorKind::InventoryJobMissing),
        None => {
            connection.create_inventory_job().await.map_err(|err| err.raise(ErrorKind::Vault))?;
        },
        Some(job) => tracing::debug!(job = %job, "Using existing inventory job"),
    }

    tokio::fs::create_dir_all(root).await.or_raise(|| ErrorKind::Volume)?;
    let mut tree = Tree::open(root, config)?;
    let archives = connection.rebuild_index(&mut tree.index).await.map_err(|err| err.raise(ErrorKind::Vault))?;
    tracing::info!(archives, "Done");
    Ok(archives)
}

/// Restore every indexed file that is missing or different locally.
///
/// Retrieval jobs for all files are requested before any download starts,
/// so they run in parallel on the service side. Files that were never
/// uploaded (empty archive id) are restored as empty files. Returns the
/// number of files restored.
pub async fn data(root: &Path, config: &VolumeConfig, connection: &Connection, tier: RetrievalTier) -> Result<usize> {
    tracing::info!(tier = %tier, "Restoring data from vault");
    let tree = Tree::open(root, config)?;
    let changes = tree.changes().await?;
    let files: Vec<IdentifiableHashedFile> = changes.deletions.into_iter().map(|deleted| deleted.0).collect();

    for file in files.iter().filter(|f| !f.archive_id().is_empty()) {
        let job = connection
            .find_or_create_archive_retrieval_job(file, tier)
            .await
            .map_err(|err| err.raise(ErrorKind::Vault))?;
        match job.status {
            JobStatus::Succeeded => tracing::debug!(path = file.path(), status = %job.status, "Retrieval job"),
            JobStatus::Failed => tracing::error!(path = file.path(), status = %job.status, "Retrieval job"),
            JobStatus::InProgress => tracing::warn!(path = file.path(), status = %job.status, "Retrieval job"),
        }
    }

    for file in &files {
        if file.archive_id().is_empty() {
            tracing::debug!(path = file.path(), "Never uploaded, restoring as empty file");
            tree.volume.save(file.path(), tokio::io::empty()).await.map_err(|err| err.raise(ErrorKind::Volume))?;
            continue;
        }
        let content = connection.load_content(file).await.map_err(|err| err.raise(ErrorKind::Vault))?;
        let written = tree.volume.restore(&content).await.map_err(|err| err.raise(ErrorKind::Volume))?;
        tracing::info!(path = file.path(), bytes = written, "Restored file");
    }
    tracing::info!(files = files.len(), "Done");
    Ok(files.len())
}

/// [`index()`] followed by [`data()`].
pub async fn all(
    root: &Path,
    config: &VolumeConfig,
    connection: &Connection,
    options: InventoryJobArgs,
    tier: RetrievalTier,
) -> Result<usize> {
    index(root, config, connection, options).await?;
    data(root, config, connection, tier).await
}
