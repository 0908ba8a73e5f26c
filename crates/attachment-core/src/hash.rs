//! # Integrity Hash Classification
//!
//! An attachment's `integrityHash` is an opaque string chosen by whichever
//! storage backend accepted the bytes. Before the bytes can be verified the
//! string has to be classified:
//!
//! 1. It is parsed as a CID. A version 0 CID is `cidv0`; any other version
//!    is rejected as unsupported.
//! 2. Otherwise it must be exactly 64 hexadecimal characters (either case),
//!    which makes it a `sha256` digest.
//! 3. Anything else is rejected.
//!
//! Classification never falls back to a default encoding.

use std::fmt;
use std::str::FromStr;

use cid::{Cid, Version};
use serde::{Deserialize, Serialize};

use crate::error::HashError;

/// Length of a hex-encoded SHA-256 digest.
const SHA256_HEX_LEN: usize = 64;

/// Hashing scheme used to derive an attachment's integrity hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashEncoding {
    /// Base58 CIDv0 of a UnixFS directory wrapping the file.
    #[serde(rename = "cidv0")]
    CidV0,
    /// Lowercase hex SHA-256 of the raw bytes.
    #[serde(rename = "sha256")]
    Sha256,
}

impl HashEncoding {
    /// Wire name of the encoding, as stored in the metadata table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CidV0 => "cidv0",
            Self::Sha256 => "sha256",
        }
    }

    /// Compare an expected integrity hash with a freshly computed one.
    ///
    /// CIDs compare exactly. Hex digests compare case-insensitively since
    /// case does not change the digest value.
    pub fn digests_match(&self, expected: &str, actual: &str) -> bool {
        match self {
            Self::CidV0 => expected == actual,
            Self::Sha256 => expected.eq_ignore_ascii_case(actual),
        }
    }
}

impl fmt::Display for HashEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashEncoding {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cidv0" => Ok(Self::CidV0),
            "sha256" => Ok(Self::Sha256),
            other => Err(HashError::Invalid(other.to_string())),
        }
    }
}

/// Classify an integrity hash.
pub fn identify(input: &str) -> Result<HashEncoding, HashError> {
    match Cid::try_from(input) {
        Ok(cid) => match cid.version() {
            Version::V0 => Ok(HashEncoding::CidV0),
            other => Err(HashError::UnsupportedVersion {
                version: u64::from(other),
            }),
        },
        Err(_) if is_sha256_hex(input) => Ok(HashEncoding::Sha256),
        Err(_) => Err(HashError::Invalid(input.to_string())),
    }
}

/// Classify an integrity hash and return it in its canonical form.
///
/// SHA-256 digests are lowercased; CIDs are returned unchanged.
pub fn normalize_integrity_hash(input: &str) -> Result<(HashEncoding, String), HashError> {
    let encoding = identify(input)?;
    let canonical = match encoding {
        HashEncoding::CidV0 => input.to_string(),
        HashEncoding::Sha256 => input.to_ascii_lowercase(),
    };
    Ok((encoding, canonical))
}

fn is_sha256_hex(input: &str) -> bool {
    input.len() == SHA256_HEX_LEN && input.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use multihash::Multihash;
    use proptest::prelude::*;
    use sha2::{Digest, Sha256};

    const SHA2_256: u64 = 0x12;
    const DAG_PB: u64 = 0x70;

    fn cid_v0_for(data: &[u8]) -> String {
        let mh = Multihash::<64>::wrap(SHA2_256, &Sha256::digest(data)).unwrap();
        Cid::new_v0(mh).unwrap().to_string()
    }

    #[test]
    fn known_cid_v0_is_cidv0() {
        assert_eq!(
            identify("QmZULkCELmmk5XNfCgTnCyFgAVxBRBXyDHGGMVoLFLiXEN"),
            Ok(HashEncoding::CidV0)
        );
    }

    #[test]
    fn cid_v1_is_unsupported() {
        let mh = Multihash::<64>::wrap(SHA2_256, &Sha256::digest(b"x")).unwrap();
        let v1 = Cid::new_v1(DAG_PB, mh).to_string();
        assert_eq!(
            identify(&v1),
            Err(HashError::UnsupportedVersion { version: 1 })
        );
        assert_eq!(
            identify("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"),
            Err(HashError::UnsupportedVersion { version: 1 })
        );
    }

    #[test]
    fn sha256_hex_is_sha256() {
        let digest = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert_eq!(identify(digest), Ok(HashEncoding::Sha256));
        assert_eq!(
            identify(&digest.to_ascii_uppercase()),
            Ok(HashEncoding::Sha256)
        );
    }

    #[test]
    fn garbage_is_invalid() {
        for input in ["", "not-a-hash", "abc123", "zz", "Qm"] {
            assert!(
                matches!(identify(input), Err(HashError::Invalid(_))),
                "{input} should be invalid"
            );
        }
    }

    #[test]
    fn hex_of_wrong_length_is_invalid() {
        let short = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b982";
        assert!(matches!(identify(short), Err(HashError::Invalid(_))));
        let long = format!("{short}44");
        assert!(matches!(identify(&long), Err(HashError::Invalid(_))));
    }

    #[test]
    fn normalize_lowercases_sha256_only() {
        let upper = "2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824";
        let (encoding, canonical) = normalize_integrity_hash(upper).unwrap();
        assert_eq!(encoding, HashEncoding::Sha256);
        assert_eq!(canonical, upper.to_ascii_lowercase());

        let cid = "QmZULkCELmmk5XNfCgTnCyFgAVxBRBXyDHGGMVoLFLiXEN";
        assert_eq!(
            normalize_integrity_hash(cid).unwrap(),
            (HashEncoding::CidV0, cid.to_string())
        );
    }

    #[test]
    fn encoding_wire_names() {
        assert_eq!(
            serde_json::to_string(&HashEncoding::CidV0).unwrap(),
            "\"cidv0\""
        );
        assert_eq!("sha256".parse::<HashEncoding>(), Ok(HashEncoding::Sha256));
        assert!("cidv1".parse::<HashEncoding>().is_err());
    }

    #[test]
    fn sha256_digests_match_ignoring_case() {
        assert!(HashEncoding::Sha256.digests_match("ABCD", "abcd"));
        assert!(!HashEncoding::CidV0.digests_match("QmA", "qma"));
    }

    proptest! {
        #[test]
        fn any_cid_v0_classifies_as_cidv0(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(identify(&cid_v0_for(&data)), Ok(HashEncoding::CidV0));
        }

        #[test]
        fn any_sha256_hex_classifies_as_sha256(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let digest: String = Sha256::digest(&data)
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect();
            prop_assert_eq!(identify(&digest), Ok(HashEncoding::Sha256));
        }

        #[test]
        fn punctuated_words_never_classify(input in "[g-z]{1,40}[!.]") {
            prop_assert!(identify(&input).is_err());
        }
    }
}
