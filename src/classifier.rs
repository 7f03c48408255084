//! Source link extraction and origin classification
//!
//! Inbound message text is scanned for the first recognizable media link.
//! Known origins are matched by a fixed, ordered pattern set; anything else
//! link-shaped falls back to [`Origin::Unknown`]. Side-effect free.

use crate::error::{Error, Result};
use crate::types::Origin;
use regex::Regex;

/// Known-origin patterns in priority order
///
/// Each pattern tolerates a missing scheme and a `www.` prefix, matching
/// links the way requesters actually paste them.
const ORIGIN_PATTERNS: &[(Origin, &str)] = &[
    (
        Origin::Tiktok,
        r"(https?://)?(www\.)?(vm\.tiktok\.com|tiktok\.com|vt\.tiktok\.com)/[^\s]+",
    ),
    (
        Origin::Youtube,
        r"(https?://)?(www\.)?(youtube\.com|youtu\.be)/[^\s]+",
    ),
    (Origin::Instagram, r"(https?://)?(www\.)?instagram\.com/[^\s]+"),
    (
        Origin::Twitter,
        r"(https?://)?(www\.)?(twitter\.com|x\.com)/[^\s]+",
    ),
    (Origin::Reddit, r"(https?://)?(www\.)?reddit\.com/[^\s]+"),
    (
        Origin::Facebook,
        r"(https?://)?(www\.)?(facebook\.com|fb\.watch)/[^\s]+",
    ),
    (Origin::Twitch, r"(https?://)?(www\.)?twitch\.tv/[^\s]+"),
    (Origin::Vimeo, r"(https?://)?(www\.)?vimeo\.com/[^\s]+"),
];

/// Generic link pattern: scheme-ful URLs plus bare `host.tld/path` forms
const GENERIC_LINK: &str = r"https?://[^\s]+|([A-Za-z0-9-]+\.)+[A-Za-z]{2,}/[^\s]+";

/// Extracts links from message text and tags them with an origin
pub struct SourceClassifier {
    origins: Vec<(Origin, Regex)>,
    generic_link: Regex,
}

impl SourceClassifier {
    /// Compile the fixed pattern set
    pub fn new() -> Result<Self> {
        let mut origins = Vec::with_capacity(ORIGIN_PATTERNS.len());
        for (origin, pattern) in ORIGIN_PATTERNS {
            let regex = Regex::new(pattern)
                .map_err(|e| Error::Other(format!("invalid {origin} link pattern: {e}")))?;
            origins.push((*origin, regex));
        }
        let generic_link = Regex::new(GENERIC_LINK)
            .map_err(|e| Error::Other(format!("invalid generic link pattern: {e}")))?;

        Ok(Self {
            origins,
            generic_link,
        })
    }

    /// Extract the first recognizable link from message text
    ///
    /// Known-origin patterns are tried in priority order against the whole
    /// text; the first origin that matches anywhere wins, even if another
    /// origin's link appears earlier in the text. When no known origin
    /// matches, the first generic link-like substring is returned tagged
    /// [`Origin::Unknown`]. Returns `None` for text with nothing
    /// link-shaped; callers ignore such messages entirely.
    pub fn classify(&self, text: &str) -> Option<(String, Origin)> {
        for (origin, regex) in &self.origins {
            if let Some(found) = regex.find(text) {
                return Some((found.as_str().to_string(), *origin));
            }
        }

        self.generic_link
            .find(text)
            .map(|found| (found.as_str().to_string(), Origin::Unknown))
    }
}
