//! EPUB Translator - book translation pipeline
//!
//! This library translates a book paragraph by paragraph through the
//! DeepSeek API, with a persistent per-book cache so no paragraph is ever
//! paid for twice, batched concurrent dispatch, cost/time telemetry, and
//! cooperative cancellation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

pub mod cli;
pub mod core;
pub mod processors;

// Re-export key types for convenience
pub use crate::core::{
    cache::TranslationCache,
    client::{DeepSeekTranslator, Translate},
    config::TranslatorConfig,
    dispatcher::{CancelToken, Dispatcher, ProgressFn, TranslatedChapters},
    errors::TranslationError,
    models::{BookId, ContentAddress, ParagraphSource, Progress},
};

pub use crate::processors::{epub::Book, export::export_translated_epub};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
