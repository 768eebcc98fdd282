//! EPUB chapter and paragraph extraction

use epub::doc::EpubDoc;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::core::errors::{Result, TranslationError};
use crate::core::models::{BookId, ParagraphSource};

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)\s*>").expect("static pattern")
    })
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("static pattern"))
}

fn block_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr|blockquote|section|article|title|td)\s*>")
            .expect("static pattern")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("static pattern"))
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(#x?[0-9a-fA-F]+|[a-zA-Z]+);").expect("static pattern"))
}

/// Strip an XHTML document down to plain chapter text. Block-level closings
/// become paragraph breaks; inline markup disappears; a handful of common
/// entities are decoded.
pub(crate) fn html_to_text(html: &str) -> String {
    let text = script_style_re().replace_all(html, "");
    let text = comment_re().replace_all(&text, "");
    let text = block_tag_re().replace_all(&text, "\n");
    let text = tag_re().replace_all(&text, "");
    let text = entity_re().replace_all(&text, |caps: &regex::Captures<'_>| {
        decode_entity(&caps[1])
    });

    let lines: Vec<&str> = text.lines().map(|line| line.trim()).collect();
    lines.join("\n").trim().to_string()
}

fn decode_entity(name: &str) -> String {
    match name {
        "amp" => "&".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        "nbsp" => " ".to_string(),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()
            } else {
                None
            };
            match code.and_then(char::from_u32) {
                Some(c) => c.to_string(),
                None => format!("&{};", name),
            }
        }
    }
}

/// An EPUB book reduced to ordered plain-text chapters.
///
/// Chapters follow spine order; empty documents (covers, blank pages) are
/// dropped. Paragraphs are the newline-delimited lines of a chapter.
#[derive(Debug, Clone)]
pub struct Book {
    title: Option<String>,
    author: Option<String>,
    chapters: Vec<String>,
}

impl Book {
    /// Open an EPUB file and extract its chapters.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut doc = EpubDoc::new(path).map_err(|e| TranslationError::InvalidFormat {
            format: format!("EPUB {}: {}", path.display(), e),
        })?;

        let title = doc.mdata("title").map(|item| item.value.clone());
        let author = doc.mdata("creator").map(|item| item.value.clone());

        let mut chapters = Vec::new();
        let num_chapters = doc.get_num_chapters();
        for i in 0..num_chapters {
            if !doc.set_current_chapter(i) {
                continue;
            }
            let Some((html, _mime)) = doc.get_current_str() else {
                continue;
            };
            let text = html_to_text(&html);
            if !text.is_empty() {
                chapters.push(text);
            }
        }

        info!(
            "Extracted {} chapters from {}",
            chapters.len(),
            path.display()
        );
        debug!("Title: {:?}, author: {:?}", title, author);

        Ok(Self {
            title,
            author,
            chapters,
        })
    }

    /// Build a book from already-extracted chapter text.
    pub fn from_chapters(title: Option<String>, chapters: Vec<String>) -> Self {
        Self {
            title,
            author: None,
            chapters,
        }
    }

    /// Book title from the EPUB metadata, if present
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Author from the EPUB metadata, if present
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Chapter texts in spine order
    pub fn chapter_texts(&self) -> &[String] {
        &self.chapters
    }

    /// Number of non-empty chapters
    pub fn num_chapters(&self) -> usize {
        self.chapters.len()
    }

    /// Number of paragraphs (newline-delimited lines) across all chapters
    pub fn num_paragraphs(&self) -> usize {
        self.chapters
            .iter()
            .map(|chapter| chapter.split('\n').count())
            .sum()
    }

    /// Whitespace-delimited word count across all chapters, the input to
    /// the upfront cost estimate.
    pub fn word_count(&self) -> usize {
        self.chapters
            .iter()
            .map(|chapter| chapter.split_whitespace().count())
            .sum()
    }

    /// Stable identifier for this book's cache file
    pub fn book_id(&self) -> BookId {
        BookId::derive(&self.chapters)
    }
}

impl ParagraphSource for Book {
    fn chapters(&self) -> Vec<Vec<String>> {
        self.chapters
            .iter()
            .map(|chapter| chapter.split('\n').map(str::to_string).collect())
            .collect()
    }
}
