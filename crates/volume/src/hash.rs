//! SHA-256 tree hash, the checksum format of the archive service.
//!
//! Content is split into 1 MiB chunks. Each chunk is hashed with SHA-256,
//! then adjacent digests are concatenated and hashed pairwise, level by
//! level, until a single root digest remains. An odd digest at the end of a
//! level is promoted to the next level unchanged.
//!
//! Empty content has no chunks and therefore no root: its tree hash is the
//! empty string.

use sha2::{Digest, Sha256};
use std::io::Result as IoResult;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const CHUNK_SIZE: usize = 1024 * 1024;

type Digest256 = [u8; 32];

/// Tree hash of everything `reader` yields, as lowercase hex.
pub async fn tree_hash<R: AsyncRead + Unpin>(mut reader: R) -> IoResult<String> {
    let mut leaves = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let filled = fill(&mut reader, &mut chunk).await?;
        if filled == 0 {
            break;
        }
        leaves.push(Sha256::digest(&chunk[..filled]).into());
        if filled < CHUNK_SIZE {
            break;
        }
    }
    Ok(root(leaves))
}

/// Tree hash of an in-memory buffer, as lowercase hex.
pub fn tree_hash_of(data: &[u8]) -> String {
    root(data.chunks(CHUNK_SIZE).map(|chunk| Sha256::digest(chunk).into()).collect())
}

/// Read until `buf` is full or the reader is exhausted.
async fn fill<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> IoResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn root(mut level: Vec<Digest256>) -> String {
    if level.is_empty() {
        return String::new();
    }
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => {
                    let mut hasher = Sha256::new();
                    hasher.update(left);
                    hasher.update(right);
                    hasher.finalize().into()
                },
                // chunks(2) only yields a single digest at the end of a level.
                odd => odd[0],
            })
            .collect();
    }
    hex::encode(level[0])
}
