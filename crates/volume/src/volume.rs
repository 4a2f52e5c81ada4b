use crate::error::{ErrorKind, Result};
use crate::file::VolumeFile;
use crate::hash::tree_hash;
use crate::path::{to_slash, validate as validate_path};
use async_stream::stream;
use cairn_model::{ContentHandle, FileWithContent};
use exn::ResultExt;
use futures::{Stream, TryStreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::fs::{self, DirEntry, File};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::instrument;

type PathStream<'a> = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

enum WalkEntry {
    File(String),
    Descend(PathBuf),
    Skip,
}

/// A local directory tree being backed up.
///
/// Every path handed out or accepted is relative to the root, uses forward
/// slashes and is validated against escaping the root.
#[derive(Debug, Clone)]
pub struct Volume {
    root: PathBuf,
    excludes: Vec<String>,
}
impl Volume {
    /// Create a volume over `root`.
    ///
    /// A relative path is excluded when it contains any of `excludes` as a
    /// substring, which also excludes everything below an excluded
    /// directory.
    pub fn new(root: impl Into<PathBuf>, excludes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            root: root.into(),
            excludes: excludes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_excluded(&self, relative: &str) -> bool {
        self.excludes.iter().any(|exclude| relative.contains(exclude.as_str()))
    }

    fn absolute_path(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(relative)?))
    }

    fn relative_path(&self, absolute: &Path) -> Result<String> {
        let relative = absolute
            .strip_prefix(&self.root)
            .or_raise(|| ErrorKind::InvalidPath(absolute.to_path_buf()))?;
        to_slash(&validate_path(relative)?)
    }

    async fn process_entry(&self, entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        let relative = self.relative_path(&path)?;
        if self.is_excluded(&relative) {
            tracing::trace!(path = %relative, "Excluded");
            return Ok(WalkEntry::Skip);
        }
        let mut metadata = entry.metadata().await.map_err(|e| ErrorKind::from_io(e, &path))?;
        if metadata.is_symlink() {
            // Follow links to regular files; never descend through a link.
            metadata = match fs::metadata(&path).await {
                Ok(target) if target.is_file() => target,
                _ => {
                    tracing::warn!(path = %relative, "Skipping symbolic link that does not point to a regular file");
                    return Ok(WalkEntry::Skip);
                },
            };
        }
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if metadata.is_file() {
            return Ok(WalkEntry::File(relative));
        }
        tracing::warn!(path = %relative, "Skipping file that is not a regular file");
        Ok(WalkEntry::Skip)
    }

    /// Stream the relative path of every regular, non-excluded file.
    ///
    /// Order is unspecified. A missing root, or a root that is not a
    /// directory, is reported as the first (and only) item.
    pub fn walk(&self) -> PathStream<'_> {
        let mut stack = vec![self.root.clone()];
        Box::pin(stream! {
            match fs::metadata(&self.root).await {
                Ok(metadata) if metadata.is_dir() => {},
                Ok(_) => {
                    yield Err(exn::Exn::from(ErrorKind::NotADirectory(self.root.clone())));
                    return;
                },
                Err(err) => {
                    yield Err(exn::Exn::from(ErrorKind::from_io(err, &self.root)));
                    return;
                },
            }
            while let Some(current) = stack.pop() {
                tracing::debug!(path = %current.display(), "Loading directory");
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    Err(err) => {
                        yield Err(exn::Exn::from(ErrorKind::from_io(err, &current)));
                        continue;
                    },
                };
                loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break,
                        Err(err) => {
                            yield Err(exn::Exn::from(ErrorKind::from_io(err, &current)));
                            break;
                        },
                    };
                    match self.process_entry(entry).await {
                        Ok(WalkEntry::File(relative)) => yield Ok(relative),
                        Ok(WalkEntry::Descend(dir)) => stack.push(dir),
                        Ok(WalkEntry::Skip) => {},
                        Err(err) => yield Err(err),
                    }
                }
            }
        })
    }

    /// Load and hash every file of the tree, sorted by path.
    ///
    /// Fails on the first unreadable directory or file.
    #[instrument(level = "debug", skip_all, fields(root = %self.root.display()))]
    pub async fn load_tree(&self) -> Result<Vec<ContentHandle>> {
        let mut paths: Vec<String> = self.walk().try_collect().await?;
        paths.sort();
        let mut files: Vec<ContentHandle> = Vec::with_capacity(paths.len());
        for relative in paths {
            files.push(Arc::new(self.load_file(&relative).await?));
        }
        tracing::debug!(files = files.len(), "Loaded tree");
        Ok(files)
    }

    /// Load one file and compute its tree hash.
    pub async fn load_file(&self, relative: &str) -> Result<VolumeFile> {
        let absolute = self.absolute_path(relative)?;
        let path = to_slash(&validate_path(relative)?)?;
        tracing::debug!(path = %path, "Loading file");
        let file = File::open(&absolute).await.map_err(|e| ErrorKind::from_io(e, &absolute))?;
        let hash = tree_hash(file).await.map_err(|e| ErrorKind::from_io(e, &absolute))?;
        if hash.is_empty() {
            tracing::warn!(path = %path, "Empty file, hash will be empty as well");
        }
        Ok(VolumeFile::new(absolute, path, hash))
    }

    /// Whether a file (or anything else) exists at the relative path.
    pub async fn exists(&self, relative: &str) -> Result<bool> {
        let absolute = self.absolute_path(relative)?;
        Ok(fs::try_exists(&absolute).await.map_err(ErrorKind::Io)?)
    }

    /// Write `reader` to the relative path, replacing any existing file and
    /// creating parent directories as needed. Returns the bytes written.
    pub async fn save(&self, relative: &str, mut reader: impl AsyncRead + Unpin) -> Result<u64> {
        let absolute = self.absolute_path(relative)?;
        tracing::debug!(path = %absolute.display(), "Saving file");
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await.map_err(|e| ErrorKind::from_io(e, parent))?;
        }
        let mut file = File::create(&absolute).await.map_err(|e| ErrorKind::from_io(e, &absolute))?;
        let written = tokio::io::copy(&mut reader, &mut file).await.map_err(ErrorKind::Io)?;
        file.flush().await.map_err(ErrorKind::Io)?;
        Ok(written)
    }

    /// Write the content of `file` at its own path.
    pub async fn restore(&self, file: &(impl FileWithContent + ?Sized)) -> Result<u64> {
        let reader = file.content().await.or_raise(|| ErrorKind::Content(file.path().to_string()))?;
        self.save(file.path(), reader).await
    }
}
