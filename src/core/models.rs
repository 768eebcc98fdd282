//! Core data models for translation

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Ordered source of paragraphs: chapters in document order, each chapter an
/// ordered sequence of paragraph strings. Implemented by [`crate::Book`];
/// anything that can produce this shape can be dispatched.
pub trait ParagraphSource {
    /// Chapters in document order, each split into paragraphs.
    fn chapters(&self) -> Vec<Vec<String>>;
}

/// Stable identifier scoping a cache file to one source document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(String);

impl BookId {
    /// Derive from chapter text. Stable across runs: the same book always
    /// maps to the same cache file.
    pub fn derive(chapters: &[String]) -> Self {
        let mut hasher = Sha256::new();
        for chapter in chapters {
            hasher.update(chapter.as_bytes());
        }
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..16].to_string())
    }

    /// Use a caller-supplied identifier instead of the derived hash.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cache key derived from a paragraph's chapter index and content.
///
/// Two paragraphs in the same chapter with identical text share an address
/// (intra-chapter dedup). The hash is SHA-256, so addresses are stable
/// across process restarts, unlike an in-memory hasher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentAddress(String);

impl ContentAddress {
    /// Derive the address for a paragraph at a given chapter index.
    pub fn derive(chapter_index: usize, text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(format!("{}:{}", chapter_index, digest))
    }

    /// The address string used as the persisted cache key
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Progress snapshot reported after every completed work item.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Unique paragraphs translated so far in this run
    pub translated: usize,
    /// Unique paragraphs that needed translation at the start of the run
    pub total_pending: usize,
    /// Estimated cumulative cost (USD) of everything in the cache
    pub cost_so_far: f64,
    /// Wall time since the run started
    pub elapsed: Duration,
    /// Linear-rate extrapolation of time left; zero when nothing is pending
    pub remaining: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_stable_across_invocations() {
        let a = ContentAddress::derive(0, "Hello world.");
        let b = ContentAddress::derive(0, "Hello world.");
        assert_eq!(a, b);
    }

    #[test]
    fn test_address_pinned_value() {
        // Regression guard: the address must never depend on process state.
        // SHA-256("Hello world.") prefixed with the chapter index.
        let addr = ContentAddress::derive(0, "Hello world.");
        assert_eq!(
            addr.as_str(),
            "0:aa3ec16e6acc809d8b2818662276256abfd2f1b441cb51574933f3d4bd115d11"
        );
    }

    #[test]
    fn test_address_differs_by_content() {
        let a = ContentAddress::derive(0, "Hello world.");
        let b = ContentAddress::derive(0, "Hello world!");
        assert_ne!(a, b);
    }

    #[test]
    fn test_address_differs_by_chapter() {
        let a = ContentAddress::derive(0, "Hello world.");
        let b = ContentAddress::derive(1, "Hello world.");
        assert_ne!(a, b);
    }

    #[test]
    fn test_book_id_derive() {
        let chapters = vec!["One".to_string(), "Two".to_string()];
        let a = BookId::derive(&chapters);
        let b = BookId::derive(&chapters);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);

        let other = BookId::derive(&["One".to_string()]);
        assert_ne!(a, other);
    }

    #[test]
    fn test_book_id_caller_supplied() {
        let id = BookId::new("my-book");
        assert_eq!(id.as_str(), "my-book");
    }
}
