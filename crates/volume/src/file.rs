use async_trait::async_trait;
use cairn_model::{BoxAsyncRead, FileWithContent, Hashed};
use std::fmt;
use std::io::Result as IoResult;
use std::path::{Path, PathBuf};
use tokio::fs::File;

/// A regular file in the volume, with its tree hash.
///
/// The hash is computed once when the file is loaded; the content is
/// reopened from disk on every [`content()`](FileWithContent::content) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeFile {
    absolute: PathBuf,
    path: String,
    hash: String,
}
impl VolumeFile {
    pub(crate) fn new(absolute: PathBuf, path: String, hash: String) -> Self {
        Self { absolute, path, hash }
    }

    pub fn absolute_path(&self) -> &Path {
        &self.absolute
    }
}
impl Hashed for VolumeFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn hash(&self) -> &str {
        &self.hash
    }
}
#[async_trait]
impl FileWithContent for VolumeFile {
    async fn content(&self) -> IoResult<BoxAsyncRead> {
        Ok(Box::pin(File::open(&self.absolute).await?))
    }

    fn local_path(&self) -> Option<&Path> {
        Some(&self.absolute)
    }
}
impl fmt::Display for VolumeFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{path: {}, treeHash: {}}}", self.path, self.hash)
    }
}
