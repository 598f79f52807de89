//! Stable storage keys for search URLs.
//!
//! A search is identified by the SHA-256 of its raw URL string. No
//! normalization is applied: two URLs that differ only in query parameter
//! order are two different searches.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default prefix for per-search keys.
pub const DEFAULT_KEY_PREFIX: &str = "search";

/// Suffix of the metadata hash key.
const METADATA_SUFFIX: &str = "first_run";

/// Lowercase hex SHA-256 of a search URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchFingerprint(String);

impl SearchFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for SearchFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint a search URL.
pub fn fingerprint(url: &str) -> SearchFingerprint {
    SearchFingerprint(format!("{:x}", Sha256::digest(url.as_bytes())))
}

/// The two storage keys derived from one search URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchKeys {
    pub fingerprint: SearchFingerprint,
    /// Set of listing ids seen for the search.
    pub ids: String,
    /// Hash of scan timestamps for the search.
    pub metadata: String,
}

impl SearchKeys {
    pub fn new(prefix: &str, url: &str) -> Self {
        let fingerprint = fingerprint(url);
        let ids = format!("{}:{}", prefix, fingerprint);
        let metadata = format!("{}:{}", ids, METADATA_SUFFIX);
        Self {
            fingerprint,
            ids,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_known_digest() {
        assert_eq!(
            fingerprint("abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            fingerprint("").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let url = "https://www.airbnb.co.uk/s/Edinburgh/homes?checkin=2025-08-12&adults=2";
        assert_eq!(fingerprint(url), fingerprint(url));
        assert_eq!(fingerprint(url).as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_does_not_normalize_query_order() {
        let a = fingerprint("https://example.com/s/homes?adults=2&children=1");
        let b = fingerprint("https://example.com/s/homes?children=1&adults=2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_distinct_inputs() {
        let fingerprints: std::collections::HashSet<_> = (0..500)
            .map(|i| fingerprint(&format!("https://example.com/s/homes?page={}", i)))
            .collect();
        assert_eq!(fingerprints.len(), 500);
    }

    #[test]
    fn test_search_keys_layout() {
        let keys = SearchKeys::new("search", "abc");
        let fp = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        assert_eq!(keys.ids, format!("search:{}", fp));
        assert_eq!(keys.metadata, format!("search:{}:first_run", fp));
        assert_eq!(keys.fingerprint.short(), "ba7816bf8f01");
    }

    #[test]
    fn test_short_on_deserialized_short_value() {
        let fp: SearchFingerprint = serde_json::from_str(r#""abc123""#).unwrap();
        assert_eq!(fp.short(), "abc123");
    }
}
