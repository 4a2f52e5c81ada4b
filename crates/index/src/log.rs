//! The on-disk change log.
//!
//! One JSON object per line, appended and never rewritten:
//!
//! ```text
//! {"type":"added","path":"dir/file.txt","hash":"9f86d0…","id":"arch-1","time":"2024-01-01T00:00:00Z"}
//! {"type":"deleted","path":"dir/file.txt","hash":"9f86d0…","id":"arch-1","time":"2024-02-01T00:00:00Z"}
//! ```
//!
//! Field names and order are fixed; existing logs written by earlier versions
//! of the tool must keep loading.

use crate::committer::Committer;
use crate::entry::{Entries, Entry};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Operation {
    Added,
    Deleted,
}

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    #[serde(rename = "type")]
    operation: Operation,
    #[serde(default)]
    path: String,
    #[serde(default)]
    hash: String,
    #[serde(rename = "id", default)]
    archive_id: String,
    #[serde(with = "time::serde::rfc3339")]
    time: OffsetDateTime,
}
impl Record {
    fn new(operation: Operation, entry: &Entry) -> Self {
        Self {
            operation,
            path: entry.path.clone(),
            hash: entry.hash.clone(),
            archive_id: entry.archive_id.clone(),
            time: entry.recorded_at,
        }
    }
}

/// Committer appending every change to a log file.
///
/// The file is opened in append mode for each record and synced before the
/// commit returns. There is no locking: one process per log file.
#[derive(Debug, Clone)]
pub struct DurableCommitter {
    path: PathBuf,
}
impl DurableCommitter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File> {
        OpenOptions::new()
            .append(true)
            .read(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| exn::Exn::from(ErrorKind::Io(e)))
    }

    fn write_record(&self, record: &Record) -> Result<()> {
        let mut line = serde_json::to_vec(record).or_raise(|| ErrorKind::Encode)?;
        line.push(b'\n');
        let mut file = self.open()?;
        file.write_all(&line).map_err(ErrorKind::Io)?;
        file.sync_data().map_err(ErrorKind::Io)?;
        Ok(())
    }

    /// Replay the log from the start, creating the file if it is missing.
    pub(crate) fn replay(&self) -> Result<Entries> {
        let reader = BufReader::new(self.open()?);
        let mut entries = Entries::default();
        let mut scanned = 0;
        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(ErrorKind::Io)?;
            tracing::trace!(line = %line, "Processing index record");
            let record: Record =
                serde_json::from_str(&line).or_raise(|| ErrorKind::CorruptLog { line: number + 1 })?;
            match record.operation {
                Operation::Added => entries.add(Entry {
                    path: record.path,
                    hash: record.hash,
                    archive_id: record.archive_id,
                    recorded_at: record.time,
                }),
                Operation::Deleted => entries.remove_by_archive_id(&record.path, &record.archive_id),
            }
            scanned += 1;
        }
        tracing::debug!(path = %self.path.display(), scanned, loaded = entries.len(), "Replayed index log");
        Ok(entries)
    }
}
impl Committer for DurableCommitter {
    fn add(&self, entry: &Entry) -> Result<()> {
        self.write_record(&Record::new(Operation::Added, entry))
    }

    fn remove(&self, entry: &Entry) -> Result<()> {
        self.write_record(&Record::new(Operation::Deleted, entry))
    }

    fn clear(&self) -> Result<()> {
        self.open()?.set_len(0).map_err(ErrorKind::Io)?;
        Ok(())
    }
}
