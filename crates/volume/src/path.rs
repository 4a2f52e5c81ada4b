//! Path validation.
//!
//! Relative paths are what the index and the vault know files by, so they
//! must mean the same thing on every run: forward slashes, no `.` or `..`
//! components, never escaping the volume root.

use crate::error::{ErrorKind, Result};
use exn::Exn;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Resolve `path` to the key a file is stored under, relative to the volume root.
///
/// `.` and empty segments are dropped and `..` consumes the segment before it.
/// The result names a file inside the volume, so a path that climbs above the
/// root, resolves to nothing, or carries a drive prefix or NUL byte fails with
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// ```
/// use std::path::Path;
/// use cairn_volume::validate_path;
///
/// let key = validate_path("2023/holiday/./raw/../beach.jpg").unwrap();
/// assert_eq!(key, Path::new("2023/holiday/beach.jpg"));
/// assert_eq!(validate_path("/documents//taxes.pdf/").unwrap(), Path::new("documents/taxes.pdf"));
///
/// assert!(validate_path("2023/../../outside.txt").is_err());
/// assert!(validate_path("holiday/.").is_ok());
/// assert!(validate_path(".").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || Exn::from(ErrorKind::InvalidPath(path.to_path_buf()));
    let mut segments: Vec<&OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) if !name.as_encoded_bytes().contains(&0) => segments.push(name),
            Component::ParentDir if segments.pop().is_some() => {},
            Component::CurDir | Component::RootDir => {},
            // NUL (truncated by syscalls), escaping `..` and drive prefixes.
            Component::Normal(_) | Component::ParentDir | Component::Prefix(_) => return Err(invalid()),
        }
    }
    match segments.is_empty() {
        true => Err(invalid()),
        false => Ok(segments.into_iter().collect()),
    }
}

/// Render a validated relative path with forward slashes.
///
/// Non-UTF-8 paths are rejected: they cannot round-trip through the index.
pub(crate) fn to_slash(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component.as_os_str().to_str() {
            Some(part) => parts.push(part),
            None => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
        }
    }
    Ok(parts.join("/"))
}
