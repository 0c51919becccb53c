//! File digests and commitment hashes
//!
//! Both are SHA-256 values rendered as `0x`-prefixed lowercase hex. The
//! rendered string, prefix included, is what gets concatenated, anchored and
//! compared, so the textual form is the canonical one.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix carried by every rendered digest
pub const HEX_PREFIX: &str = "0x";

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-256 of a single file's bytes
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileDigest(String);

impl FileDigest {
    /// Digest the exact byte content of a file
    pub fn of(content: &[u8]) -> Self {
        Self(format!("{}{}", HEX_PREFIX, sha256_hex(content)))
    }

    /// Rendered form (`0x` + 64 hex chars)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileDigest({})", self.0.get(..18).unwrap_or(&self.0))
    }
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Aggregate commitment over an ordered list of file digests
///
/// The commitment is order sensitive: callers must present files in a
/// stable order (upload order) to reproduce it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitmentHash(String);

impl CommitmentHash {
    /// Hash the concatenation of the rendered digests, in the order given
    pub fn compute(digests: &[FileDigest]) -> Self {
        let mut hasher = Sha256::new();
        for digest in digests {
            hasher.update(digest.as_str().as_bytes());
        }
        Self(format!("{}{}", HEX_PREFIX, hex::encode(hasher.finalize())))
    }

    /// Rendered form (`0x` + 64 hex chars)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex body without the `0x` prefix
    pub fn hex_body(&self) -> &str {
        self.0.strip_prefix(HEX_PREFIX).unwrap_or(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Wrap a previously rendered commitment (e.g. read back from storage)
    pub fn from_rendered(rendered: impl Into<String>) -> Self {
        Self(rendered.into())
    }
}

impl fmt::Debug for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitmentHash({})", self.0.get(..18).unwrap_or(&self.0))
    }
}

impl fmt::Display for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
