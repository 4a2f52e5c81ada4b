//! Archive vault connection for cairn.
//!
//! - [`client`]: the [`GlacierClient`](client::GlacierClient) trait, a thin
//!   one-to-one mirror of the vault operations, with an AWS implementation
//!   (feature `aws`) and an in-memory one (feature `mock`).
//! - [`Connection`]: uploads, deletes, job creation, polling to completion,
//!   inventory decoding and archive retrieval.
//! - [`Processor`]: applies [`Changes`](cairn_model::Changes) to the vault and
//!   commits every success to the index.
//! - [`Connection::rebuild_index`]: replaces the index with the vault
//!   inventory.

mod archive;
pub mod client;
mod connection;
pub mod error;
mod inventory;
mod processor;
mod reconcile;
mod tier;

pub use crate::archive::RetrievedArchive;
pub use crate::connection::Connection;
pub use crate::inventory::{Inventory, InventoryArchive};
pub use crate::processor::{ProcessEvent, Processor};
pub use crate::tier::RetrievalTier;
