//! Content identifiers.
//!
//! A [`ContentId`] is an immutable, validated CID. Two encodings exist:
//! legacy v0 (base58btc, always dag-pb + sha2-256) and current v1
//! (multibase, any codec). They convert into each other where the codec
//! allows it, but compare unequal: use [`ContentId::same_content`] to ask
//! whether two identifiers address the same bytes.

use std::fmt;
use std::str::FromStr;

use cid::multihash::Multihash;
use cid::{Cid, Version};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreError;

/// Multicodec for raw bytes.
pub const RAW: u64 = 0x55;
/// Multicodec for dag-pb (UnixFS nodes).
pub const DAG_PB: u64 = 0x70;
/// Multicodec for dag-json.
pub const DAG_JSON: u64 = 0x0129;
/// Multihash code for sha2-256.
pub const SHA2_256: u64 = 0x12;

/// A validated content identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(Cid);

impl ContentId {
    /// Parses a CID string in either encoding.
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(StoreError::InvalidCid {
                input: input.to_string(),
                reason: "empty".into(),
            });
        }
        Cid::try_from(trimmed)
            .map(Self)
            .map_err(|e| StoreError::InvalidCid {
                input: input.to_string(),
                reason: e.to_string(),
            })
    }

    /// Builds a CIDv1 for `codec` over the sha2-256 digest of `data`.
    pub fn sha256_v1(codec: u64, data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        // A 32-byte digest always fits the 64-byte multihash.
        let hash = Multihash::<64>::wrap(SHA2_256, &digest)
            .unwrap_or_else(|_| unreachable!("sha2-256 digest exceeds multihash capacity"));
        Self(Cid::new_v1(codec, hash))
    }

    /// Returns the CID version of this encoding.
    pub fn version(&self) -> Version {
        self.0.version()
    }

    /// Returns the multicodec of the addressed data.
    pub fn codec(&self) -> u64 {
        self.0.codec()
    }

    /// Converts to the legacy v0 encoding.
    ///
    /// Only dag-pb content hashed with sha2-256 has a v0 form.
    pub fn to_v0(&self) -> Result<Self, StoreError> {
        if self.0.version() == Version::V0 {
            return Ok(*self);
        }
        if self.0.codec() != DAG_PB {
            return Err(StoreError::InvalidCid {
                input: self.to_string(),
                reason: format!("codec 0x{:x} has no v0 form", self.0.codec()),
            });
        }
        Cid::new_v0(*self.0.hash())
            .map(Self)
            .map_err(|e| StoreError::InvalidCid {
                input: self.to_string(),
                reason: e.to_string(),
            })
    }

    /// Converts to the v1 encoding.
    pub fn to_v1(&self) -> Self {
        match self.0.into_v1() {
            Ok(cid) => Self(cid),
            // into_v1 only fails for v0 with a non-dag-pb codec, which
            // cannot be constructed.
            Err(_) => *self,
        }
    }

    /// Returns `true` when both identifiers address the same content,
    /// regardless of encoding.
    pub fn same_content(&self, other: &ContentId) -> bool {
        self.to_v1() == other.to_v1()
    }

    /// Returns the underlying CID.
    pub fn as_cid(&self) -> &Cid {
        &self.0
    }
}

impl From<Cid> for ContentId {
    fn from(cid: Cid) -> Self {
        Self(cid)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentId> for String {
    fn from(cid: ContentId) -> Self {
        cid.to_string()
    }
}

/// Returns `true` if `input` parses as a CID.
pub fn is_valid_cid(input: &str) -> bool {
    ContentId::parse(input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // The empty UnixFS directory, well known in both encodings.
    const EMPTY_DIR_V0: &str = "QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn";
    const EMPTY_DIR_V1: &str = "bafybeiczsscdsbs7ffqz55asqdf3smv6klcw3gofszvwlyarci47bgf354";

    #[test]
    fn parses_both_encodings() {
        let v0 = ContentId::parse(EMPTY_DIR_V0).unwrap();
        let v1 = ContentId::parse(EMPTY_DIR_V1).unwrap();
        assert_eq!(v0.version(), Version::V0);
        assert_eq!(v1.version(), Version::V1);
        assert_eq!(v0.to_string(), EMPTY_DIR_V0);
        assert_eq!(v1.to_string(), EMPTY_DIR_V1);
    }

    #[test]
    fn v0_and_v1_convert_but_are_not_equal() {
        let v0 = ContentId::parse(EMPTY_DIR_V0).unwrap();
        let v1 = ContentId::parse(EMPTY_DIR_V1).unwrap();

        assert_ne!(v0, v1);
        assert!(v0.same_content(&v1));
        assert_eq!(v0.to_v1(), v1);
        assert_eq!(v1.to_v0().unwrap(), v0);
    }

    #[test]
    fn raw_codec_has_no_v0_form() {
        let cid = ContentId::sha256_v1(RAW, b"hello");
        assert!(cid.to_v0().is_err());
        assert_eq!(cid.to_v1(), cid);
    }

    #[test]
    fn sha256_v1_is_deterministic() {
        let a = ContentId::sha256_v1(RAW, b"landing page");
        let b = ContentId::sha256_v1(RAW, b"landing page");
        let c = ContentId::sha256_v1(RAW, b"landing page!");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.to_string().starts_with('b'));
    }

    #[test]
    fn rejects_garbage() {
        assert!(ContentId::parse("").is_err());
        assert!(ContentId::parse("not-a-cid").is_err());
        assert!(!is_valid_cid("   "));
        assert!(is_valid_cid(EMPTY_DIR_V1));
    }

    #[test]
    fn serde_uses_string_form() {
        let cid = ContentId::parse(EMPTY_DIR_V1).unwrap();
        let json = serde_json::to_string(&cid).unwrap();
        assert_eq!(json, format!("\"{EMPTY_DIR_V1}\""));

        let parsed: ContentId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cid);

        assert!(serde_json::from_str::<ContentId>("\"nope\"").is_err());
    }
}
