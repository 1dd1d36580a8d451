//! Keyword matching for search queries.
//!
//! Matching is a plain substring test after folding both sides: canonical
//! decomposition, combining marks dropped, then lower-cased. So "CAFE"
//! finds "café" and "Ångström" finds "angstrom".

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold text for case- and diacritic-insensitive comparison.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// A folded search keyword, ready to test against many haystacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Needle {
    folded: String,
}

impl Needle {
    /// Returns `None` when the keyword is blank after trimming.
    pub fn new(keyword: &str) -> Option<Self> {
        let trimmed = keyword.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            folded: fold(trimmed),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.folded
    }

    pub fn matches(&self, haystack: &str) -> bool {
        fold(haystack).contains(&self.folded)
    }
}
