//! Source URL normalization and fingerprinting
//!
//! The artifact cache is keyed by a fingerprint: the SHA-256 digest of a
//! normalized form of the source URL. Trivially different spellings of the
//! same link (uppercase host, missing scheme, trailing slash, fragment)
//! normalize to one string and therefore share one cache entry.

use crate::types::Fingerprint;
use sha2::{Digest, Sha256};
use url::Url;

/// Normalize a raw source URL into its canonical form
///
/// Trims surrounding whitespace, assumes `https` when the scheme is
/// missing, lowercases scheme and host through URL parsing, drops any
/// fragment, and drops a single trailing slash on non-root paths. Query
/// strings are preserved since different queries can address different
/// media. Input that fails URL parsing is returned trimmed but otherwise
/// untouched, so the fingerprint stays deterministic.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    match Url::parse(&candidate) {
        Ok(mut url) => {
            url.set_fragment(None);
            let path = url.path().to_string();
            if let Some(stripped) = path.strip_suffix('/')
                && !stripped.is_empty()
            {
                url.set_path(stripped);
            }
            url.to_string()
        }
        Err(_) => trimmed.to_string(),
    }
}

/// Fingerprint a source URL
///
/// Stable across processes and restarts: equal normalized URLs always
/// produce equal fingerprints (lowercase hex, 64 characters).
pub fn fingerprint(raw_url: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(raw_url).as_bytes());
    Fingerprint(format!("{:x}", hasher.finalize()))
}
