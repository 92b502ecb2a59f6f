use sha2::{Digest, Sha256};
use std::fmt;

const IDENTITY_HEX_LEN: usize = 32;

/// Deterministic fingerprint of a document locator.
///
/// SHA-256 of the trimmed locator, hex encoded and truncated to 128 bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentIdentity(String);

impl DocumentIdentity {
    /// Fingerprint `locator`; surrounding whitespace is ignored.
    pub fn from_locator(locator: &str) -> Self {
        let digest = Sha256::digest(locator.trim().as_bytes());
        let mut encoded = hex::encode(digest);
        encoded.truncate(IDENTITY_HEX_LEN);
        Self(encoded)
    }

    /// Hex form of the identity.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Partition holding this document's vectors.
    pub fn partition(&self) -> PartitionId {
        PartitionId(format!("doc-{}", self.0))
    }
}

impl fmt::Display for DocumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of an isolated partition inside the shared collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(String);

impl PartitionId {
    /// Raw partition name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
