//! Versioned content digests of exported project trees.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version of the tree hashing algorithm this build produces
///
/// Bumped whenever the bytes fed to the hasher change, so that digests from
/// an older algorithm are reported as a version mismatch rather than as
/// tampered content.
pub const HASH_VERSION: u32 = 1;

/// A content digest tagged with the algorithm version that produced it
///
/// Textual form is `"<version>:<lowercase hex>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionedDigest {
    pub hash_version: u32,
    pub digest: Vec<u8>,
}

impl VersionedDigest {
    pub fn new(hash_version: u32, digest: Vec<u8>) -> Self {
        Self {
            hash_version,
            digest,
        }
    }

    /// True if there are no digest bytes to compare against
    pub fn is_empty(&self) -> bool {
        self.digest.is_empty()
    }
}

impl fmt::Display for VersionedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash_version, hex::encode(&self.digest))
    }
}

impl FromStr for VersionedDigest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (version, hex_part) = s
            .split_once(':')
            .ok_or_else(|| format!("digest {:?} is missing its hash version prefix", s))?;
        let hash_version = version
            .parse::<u32>()
            .map_err(|e| format!("invalid hash version in digest {:?}: {}", s, e))?;
        let digest =
            hex::decode(hex_part).map_err(|e| format!("invalid hex in digest {:?}: {}", s, e))?;
        Ok(Self {
            hash_version,
            digest,
        })
    }
}

impl TryFrom<String> for VersionedDigest {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionedDigest> for String {
    fn from(value: VersionedDigest) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let d = VersionedDigest::new(1, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(d.to_string(), "1:deadbeef");
        assert_eq!("1:deadbeef".parse::<VersionedDigest>().unwrap(), d);
    }

    #[test]
    fn test_parse_errors() {
        assert!("deadbeef".parse::<VersionedDigest>().is_err());
        assert!("x:deadbeef".parse::<VersionedDigest>().is_err());
        assert!("1:zz".parse::<VersionedDigest>().is_err());
    }

    #[test]
    fn test_empty_digest() {
        let d: VersionedDigest = "1:".parse().unwrap();
        assert!(d.is_empty());
    }
}
