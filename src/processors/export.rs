//! Translated EPUB assembly
//!
//! Writes a fresh EPUB 3 container from the extracted chapters and the
//! translation cache. Re-assembly is positional: each paragraph slot is
//! resolved through its content address, so nothing is re-matched against
//! the original markup. Paragraphs the cache does not hold keep their
//! original text.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::cache::TranslationCache;
use crate::core::errors::Result;
use crate::core::models::ContentAddress;
use crate::processors::epub::Book;

/// Escape text for inclusion in XHTML content
fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Resolve one chapter's paragraphs against the cache: blank lines are
/// dropped, hits become the translation, misses keep the source text.
fn resolve_chapter(chapter_index: usize, chapter: &str, cache: &TranslationCache) -> Vec<String> {
    chapter
        .split('\n')
        .filter(|paragraph| !paragraph.trim().is_empty())
        .map(|paragraph| {
            let address = ContentAddress::derive(chapter_index, paragraph);
            match cache.get(&address) {
                Some(translation) => translation.to_string(),
                None => paragraph.to_string(),
            }
        })
        .collect()
}

fn chapter_xhtml(title: &str, paragraphs: &[String]) -> String {
    let mut body = String::new();
    for paragraph in paragraphs {
        body.push_str("    <p>");
        body.push_str(&xml_escape(paragraph));
        body.push_str("</p>\n");
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"fr\" lang=\"fr\">\n\
         <head>\n    <title>{}</title>\n</head>\n\
         <body>\n{}</body>\n\
         </html>\n",
        xml_escape(title),
        body
    )
}

fn nav_xhtml(chapter_count: usize) -> String {
    let mut items = String::new();
    for i in 1..=chapter_count {
        items.push_str(&format!(
            "            <li><a href=\"chap_{i}.xhtml\">Chapitre {i}</a></li>\n"
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" xml:lang=\"fr\" lang=\"fr\">\n\
         <head>\n    <title>Table des mati\u{e8}res</title>\n</head>\n\
         <body>\n    <nav epub:type=\"toc\">\n        <ol>\n{items}        </ol>\n    </nav>\n</body>\n\
         </html>\n"
    )
}

fn content_opf(book: &Book, identifier: &str, chapter_count: usize) -> String {
    let title = book.title().unwrap_or("Translated Book");
    let modified = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

    let creator = match book.author() {
        Some(author) => format!("        <dc:creator>{}</dc:creator>\n", xml_escape(author)),
        None => String::new(),
    };

    let mut manifest = String::new();
    let mut spine = String::new();
    for i in 1..=chapter_count {
        manifest.push_str(&format!(
            "        <item id=\"chap_{i}\" href=\"chap_{i}.xhtml\" media-type=\"application/xhtml+xml\"/>\n"
        ));
        spine.push_str(&format!("        <itemref idref=\"chap_{i}\"/>\n"));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\" unique-identifier=\"book-id\">\n\
         \x20   <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n\
         \x20       <dc:identifier id=\"book-id\">{identifier}</dc:identifier>\n\
         \x20       <dc:title>{title}</dc:title>\n\
         \x20       <dc:language>fr</dc:language>\n\
         {creator}\
         \x20       <meta property=\"dcterms:modified\">{modified}</meta>\n\
         \x20   </metadata>\n\
         \x20   <manifest>\n\
         \x20       <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n\
         {manifest}\
         \x20   </manifest>\n\
         \x20   <spine>\n\
         {spine}\
         \x20   </spine>\n\
         </package>\n",
        title = xml_escape(title),
    )
}

const CONTAINER_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
    <container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n\
    \x20   <rootfiles>\n\
    \x20       <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>\n\
    \x20   </rootfiles>\n\
    </container>\n";

/// Write the translated book as an EPUB at `output`.
pub fn export_translated_epub(
    book: &Book,
    cache: &TranslationCache,
    output: &Path,
) -> Result<PathBuf> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(output)?;
    let mut zip = ZipWriter::new(file);

    // mimetype must be the first entry and stored uncompressed.
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file("META-INF/container.xml", deflated)?;
    zip.write_all(CONTAINER_XML.as_bytes())?;

    let chapters = book.chapter_texts();
    let identifier = format!("{}_translated", book.book_id());

    zip.start_file("OEBPS/content.opf", deflated)?;
    zip.write_all(content_opf(book, &identifier, chapters.len()).as_bytes())?;

    zip.start_file("OEBPS/nav.xhtml", deflated)?;
    zip.write_all(nav_xhtml(chapters.len()).as_bytes())?;

    for (chapter_index, chapter) in chapters.iter().enumerate() {
        let paragraphs = resolve_chapter(chapter_index, chapter, cache);
        let title = format!("Chapitre {}", chapter_index + 1);
        zip.start_file(format!("OEBPS/chap_{}.xhtml", chapter_index + 1), deflated)?;
        zip.write_all(chapter_xhtml(&title, &paragraphs).as_bytes())?;
    }

    zip.finish()?;
    info!(
        "Exported {} chapters to {}",
        chapters.len(),
        output.display()
    );
    Ok(output.to_path_buf())
}
