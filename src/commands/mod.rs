//! One function per command. Each takes what it needs explicitly so it can
//! run against any [`Connection`](cairn_glacier::Connection).

pub mod changes;
pub mod inventory;
pub mod recover;

use crate::error::{ErrorKind, Result};
use cairn_config::VolumeConfig;
use cairn_index::Index;
use cairn_model::Changes;
use cairn_volume::Volume;
use std::path::Path;

/// A backed up tree and its index log.
pub(crate) struct Tree {
    pub volume: Volume,
    pub index: Index,
}
impl Tree {
    pub fn open(root: &Path, config: &VolumeConfig) -> Result<Self> {
        let volume = Volume::new(root, config.all_excludes());
        let index = Index::load(config.index_path(root)).map_err(|err| err.raise(ErrorKind::Index))?;
        tracing::debug!(root = %root.display(), entries = index.len(), "Opened tree");
        Ok(Self { volume, index })
    }

    /// Walk and hash the tree, then diff it against the index.
    pub async fn changes(&self) -> Result<Changes> {
        let files = self.volume.load_tree().await.map_err(|err| err.raise(ErrorKind::Volume))?;
        let changes = self.index.calculate_changes(&files);
        tracing::info!(
            additions = changes.additions.len(),
            deletions = changes.deletions.len(),
            "Calculated changes"
        );
        Ok(changes)
    }
}
