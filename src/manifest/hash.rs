//! Content hashing shared by the manifest builder and the client sync engine.
//!
//! A content hash is the first 128 bits of the file's SHA-256 digest rendered
//! as 32 lower-case hex characters. It is used for change detection only.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Number of digest bytes kept in a content hash.
pub const DIGEST_BYTES: usize = 16;

/// Length of a rendered content hash in hex characters.
pub const HASH_HEX_LEN: usize = DIGEST_BYTES * 2;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Hashes an in-memory buffer.
///
/// # Examples
///
/// ```rust
/// use rollout::manifest::hash_bytes;
///
/// let hash = hash_bytes(b"test");
/// assert_eq!(hash, "9f86d081884c7d659a2feaa0c55ad015");
/// ```
#[must_use]
pub fn hash_bytes(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    hex::encode(&digest[..DIGEST_BYTES])
}

/// Hashes a file by streaming its bytes.
///
/// Files are read in fixed-size chunks so installers and large assets never
/// have to fit in memory.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let digest = hasher.finalize();
    Ok(hex::encode(&digest[..DIGEST_BYTES]))
}

/// Returns `true` if `value` looks like a content hash.
#[must_use]
pub fn is_valid_hash(value: &str) -> bool {
    value.len() == HASH_HEX_LEN
        && value.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
