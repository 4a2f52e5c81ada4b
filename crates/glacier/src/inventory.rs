//! Vault inventory payload.
//!
//! The service produces the payload; its shape is fixed:
//!
//! ```json
//! {
//!   "VaultARN": "arn:aws:glacier:eu-west-1:012345678901:vaults/photos",
//!   "InventoryDate": "2024-03-01T10:00:00Z",
//!   "ArchiveList": [
//!     {
//!       "ArchiveId": "kKB7ymWJVpPSwhGP6ycSOAekp9ZYe_--zM_mw6k76ZFGEIWQX-ybtRDvc2VkPSDtfKmQrj0IRQLSGsNuDp-AJVlu2ccmDSyDUmZwKbwbpAdGATGDiB3hHO0bjbGehXTcApVud_wyDw",
//!       "ArchiveDescription": "2023/holiday/beach.jpg",
//!       "CreationDate": "2024-02-28T09:15:21Z",
//!       "Size": 3145728,
//!       "SHA256TreeHash": "9628195fcdbcbbe76cdde932d4646fa7de5f219fb39823836d81f0cc0e18aa67"
//!     }
//!   ]
//! }
//! ```
//!
//! The archive description is the file's relative path, as written by
//! [`Connection::upload`](crate::Connection::upload). Unknown fields are
//! ignored. An archive without a `CreationDate` (or with `null`) is dated
//! [`UNIX_EPOCH`](OffsetDateTime::UNIX_EPOCH), so it sorts as the oldest.

use crate::error::{ErrorKind, Result};
use cairn_model::{Hashed, Identifiable, IdentifiableHashedFile};
use exn::ResultExt;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry as MapEntry;
use time::OffsetDateTime;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(rename = "VaultARN", default, skip_serializing_if = "Option::is_none")]
    pub vault_arn: Option<String>,
    #[serde(rename = "InventoryDate", default, skip_serializing_if = "Option::is_none")]
    pub inventory_date: Option<String>,
    #[serde(rename = "ArchiveList", default)]
    pub archives: Vec<InventoryArchive>,
}

/// One archive as listed by an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryArchive {
    #[serde(rename = "ArchiveId")]
    pub archive_id: String,
    #[serde(rename = "ArchiveDescription", default)]
    pub description: String,
    #[serde(
        rename = "CreationDate",
        default = "undated",
        deserialize_with = "creation_date",
        serialize_with = "time::serde::rfc3339::serialize"
    )]
    pub creation_date: OffsetDateTime,
    #[serde(rename = "Size", default)]
    pub size: u64,
    #[serde(rename = "SHA256TreeHash", default)]
    pub tree_hash: String,
}

fn undated() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

fn creation_date<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<OffsetDateTime, D::Error> {
    Ok(time::serde::rfc3339::option::deserialize(deserializer)?.unwrap_or_else(undated))
}

impl Hashed for InventoryArchive {
    fn path(&self) -> &str {
        &self.description
    }

    fn hash(&self) -> &str {
        &self.tree_hash
    }
}
impl Identifiable for InventoryArchive {
    fn archive_id(&self) -> &str {
        &self.archive_id
    }
}

impl Inventory {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).or_raise(|| ErrorKind::Decode)
    }

    /// Every archive, duplicates (same path, several uploads) included.
    pub fn files(&self) -> Vec<IdentifiableHashedFile> {
        self.archives.iter().map(IdentifiableHashedFile::of).collect()
    }

    /// The most recently created archive per path.
    ///
    /// On equal creation dates the archive listed first is kept.
    pub fn newest_by_path(&self) -> BTreeMap<String, IdentifiableHashedFile> {
        let mut newest: BTreeMap<String, &InventoryArchive> = BTreeMap::new();
        for archive in &self.archives {
            match newest.entry(archive.description.clone()) {
                MapEntry::Vacant(slot) => {
                    slot.insert(archive);
                },
                MapEntry::Occupied(mut slot) => {
                    if slot.get().creation_date < archive.creation_date {
                        slot.insert(archive);
                    }
                },
            }
        }
        newest.into_iter().map(|(path, archive)| (path, IdentifiableHashedFile::of(archive))).collect()
    }
}
