//! Integrity hash computation for each supported encoding.

use attachment_core::HashEncoding;
use sha2::{Digest, Sha256};

use crate::error::StorageError;
use crate::unixfs;

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Compute the integrity hash of `bytes` under `encoding`.
///
/// `filename` only matters for `cidv0`, where the file is hashed inside a
/// wrapping directory entry carrying that name.
pub fn compute(
    encoding: HashEncoding,
    bytes: &[u8],
    filename: &str,
) -> Result<String, StorageError> {
    match encoding {
        HashEncoding::CidV0 => unixfs::wrapped_cid_v0(bytes, filename),
        HashEncoding::Sha256 => Ok(sha256_hex(bytes)),
    }
}
