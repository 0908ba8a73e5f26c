//! # Error Types
//!
//! Errors raised while classifying integrity hashes. Storage, federation
//! and HTTP errors live in the crates that own those concerns.

use thiserror::Error;

/// An integrity hash could not be classified into a supported encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The input parsed as a CID, but of a version the service cannot verify.
    #[error("unsupported CID version {version}")]
    UnsupportedVersion {
        /// CID version found in the input.
        version: u64,
    },

    /// The input is neither a CID nor a 64-character hex SHA-256 digest.
    #[error("invalid integrity hash: {0:?}")]
    Invalid(String),
}
