use crate::commands::Tree;
use crate::error::{ErrorKind, Result};
use cairn_config::VolumeConfig;
use cairn_glacier::{Connection, ProcessEvent, Processor};
use cairn_model::Identifiable;
use exn::ResultExt;
use std::io::Write;
use std::path::Path;

/// Print one `+` line per addition and one `-` line per deletion.
pub async fn ls(root: &Path, config: &VolumeConfig, out: &mut impl Write) -> Result<()> {
    tracing::info!("Listing local changes");
    let changes = Tree::open(root, config)?.changes().await?;
    writeln!(out, "Detected changes:").or_raise(|| ErrorKind::Output)?;
    for addition in &changes.additions {
        writeln!(out, "+ {addition}").or_raise(|| ErrorKind::Output)?;
    }
    for deletion in &changes.deletions {
        writeln!(out, "- {deletion}").or_raise(|| ErrorKind::Output)?;
    }
    Ok(())
}

/// Upload additions, delete removed archives and record both in the index.
pub async fn upload(root: &Path, config: &VolumeConfig, connection: &Connection) -> Result<()> {
    let mut tree = Tree::open(root, config)?;
    let changes = tree.changes().await?;
    if changes.is_empty() {
        tracing::info!("Nothing to upload");
        return Ok(());
    }
    Processor::new(connection)
        .process(&mut tree.index, &changes, |event| match event {
            ProcessEvent::Committed(commit) => {
                tracing::debug!(kind = %commit.kind, path = %commit.path, archive_id = %commit.archive_id, "Committed")
            },
            event => tracing::info!(event = %event, "Processed change"),
        })
        .await
        .map_err(|err| err.raise(ErrorKind::Vault))?;
    tracing::info!("Done");
    Ok(())
}

/// Mark every local change as processed without contacting the vault.
///
/// Deleted entries are removed with their archive ids; additions are
/// recorded with an empty archive id, so they are never retrievable.
pub async fn commit(root: &Path, config: &VolumeConfig) -> Result<()> {
    tracing::warn!("Committing all local changes to the index without uploading");
    let mut tree = Tree::open(root, config)?;
    let changes = tree.changes().await?;
    for deletion in &changes.deletions {
        tree.index
            .commit_delete(deletion.archive_id(), deletion)
            .map_err(|err| err.raise(ErrorKind::Index))?;
    }
    for addition in &changes.additions {
        tree.index.commit_add("", addition).map_err(|err| err.raise(ErrorKind::Index))?;
    }
    tracing::info!(changes = changes.len(), "Done");
    Ok(())
}
