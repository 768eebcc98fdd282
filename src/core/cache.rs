//! Persistent per-book translation cache
//!
//! One JSON file per book, mapping content addresses to translated text.
//! The mapping is flushed after every successful translation, so a crash or
//! cancellation loses at most the paragraphs still in flight.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::errors::{Result, TranslationError};
use crate::core::models::{BookId, ContentAddress};

/// Persistent mapping from [`ContentAddress`] to translated text, scoped to
/// a single book. Entries written for one book are never visible to another.
#[derive(Debug, Clone)]
pub struct TranslationCache {
    path: PathBuf,
    entries: HashMap<ContentAddress, String>,
}

impl TranslationCache {
    /// Load the cache for a book, creating `cache_dir` if needed.
    ///
    /// A missing file yields an empty cache. A file that exists but does not
    /// parse is a hard error: silently starting over would re-bill every
    /// already-translated paragraph.
    pub fn load(cache_dir: &Path, book_id: &BookId) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)?;
        let path = cache_dir.join(format!("{}.json", book_id));

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let entries: HashMap<ContentAddress, String> = serde_json::from_str(&content)
                .map_err(|e| TranslationError::CacheError {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            info!(
                "Loaded {} cached translations for book {}",
                entries.len(),
                book_id
            );
            entries
        } else {
            debug!("No cache file for book {}, starting empty", book_id);
            HashMap::new()
        };

        Ok(Self { path, entries })
    }

    /// Look up a translation by address
    pub fn get(&self, address: &ContentAddress) -> Option<&str> {
        self.entries.get(address).map(|s| s.as_str())
    }

    /// Record a translation in memory. The dispatcher's dedup pre-pass
    /// guarantees an address is only ever written once per cache lifetime.
    pub fn put(&mut self, address: ContentAddress, text: String) {
        self.entries.insert(address, text);
    }

    /// Flush the full mapping to disk. Called after every successful
    /// translation, not at end of run.
    pub fn persist(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Delete the persisted file and clear the in-memory mapping, forcing a
    /// full retranslation on the next run.
    pub fn reset(&mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        self.entries.clear();
        info!("Cache reset: {}", self.path.display());
        Ok(())
    }

    /// Number of cached translations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total whitespace-delimited word count across all cached values,
    /// the basis for the running cost estimate.
    pub fn word_count(&self) -> usize {
        self.entries
            .values()
            .map(|text| text.split_whitespace().count())
            .sum()
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
