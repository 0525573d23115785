//! SHA256 digest utilities for content-addressed manifests
//!
//! Registries identify every manifest and blob by `algorithm:hex`. This module
//! validates that form and derives order-independent identities for manifest
//! sets.

use sha2::{Digest, Sha256};

/// Docker digest of zero bytes, handy as a sentinel in fixtures
pub const EMPTY_DIGEST: &str =
    "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Utilities for working with content digests
pub struct DigestUtils;

impl DigestUtils {
    /// Compute SHA256 digest from byte data, hex only
    pub fn compute_sha256(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Compute full Docker digest (with sha256: prefix) from byte data
    pub fn compute_docker_digest(data: &[u8]) -> String {
        format!("sha256:{}", Self::compute_sha256(data))
    }

    /// Validate a digest of the form `algorithm:hex`.
    ///
    /// `sha256` digests must carry exactly 64 hex characters. Other
    /// algorithms are accepted as long as both parts are non-empty and the
    /// encoded part is hex.
    pub fn is_valid_digest(digest: &str) -> bool {
        let Some((algorithm, encoded)) = digest.split_once(':') else {
            return false;
        };
        if algorithm.is_empty()
            || !algorithm
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+._-".contains(c))
        {
            return false;
        }
        if encoded.is_empty() || !encoded.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }
        algorithm != "sha256" || encoded.len() == 64
    }

    /// Shortened form for log lines (`sha256:0123456789ab`)
    pub fn short(digest: &str) -> &str {
        let end = digest
            .find(':')
            .map(|pos| pos + 13)
            .unwrap_or(12)
            .min(digest.len());
        digest.get(..end).unwrap_or(digest)
    }

    /// Identity of a set of manifest digests, independent of their order.
    ///
    /// Digests are sorted and de-duplicated, joined with newlines and hashed.
    pub fn set_digest<'a, I>(digests: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut sorted: Vec<&str> = digests.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();
        Self::compute_docker_digest(sorted.join("\n").as_bytes())
    }
}
