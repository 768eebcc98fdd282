//! CLI command definitions and handlers

use clap::Subcommand;
use std::path::PathBuf;

/// Commands for the EPUB translator
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate an EPUB book into French
    Translate {
        /// Input EPUB file (required)
        #[arg(short, long)]
        file: PathBuf,

        /// Output EPUB path (default: <cache dir>/translated_<book id>.epub)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Paragraphs dispatched concurrently per batch
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Discard the cached translations for this book first
        #[arg(long)]
        reset: bool,
    },

    /// Show book statistics and a cost estimate without translating
    Estimate {
        /// Input EPUB file (required)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete all cached translations for a book
    ResetCache {
        /// Input EPUB file (required)
        #[arg(short, long)]
        file: PathBuf,
    },
}

/// Handle the translate command
pub async fn handle_translate(
    file: PathBuf,
    output: Option<PathBuf>,
    max_concurrent: Option<usize>,
    reset: bool,
) -> anyhow::Result<()> {
    use crate::core::cache::TranslationCache;
    use crate::core::client::DeepSeekTranslator;
    use crate::core::config::TranslatorConfig;
    use crate::core::dispatcher::{CancelToken, Dispatcher};
    use crate::core::models::Progress;
    use crate::processors::epub::Book;
    use crate::processors::export::export_translated_epub;
    use indicatif::{ProgressBar, ProgressStyle};
    use std::sync::Arc;
    use std::time::Instant;
    use tracing::info;

    let start_time = Instant::now();

    let mut config = TranslatorConfig::load()?;
    if let Some(n) = max_concurrent {
        config.max_concurrent = n;
    }

    info!("Starting EPUB translation");
    info!("Input: {}", file.display());

    let book = Book::open(&file)?;
    let book_id = book.book_id();
    print_book_stats(&book);

    let mut cache = TranslationCache::load(&config.cache_dir, &book_id)?;
    if reset {
        cache.reset()?;
        println!("   Cache cleared for book {}", book_id);
    } else if !cache.is_empty() {
        println!("   Resuming: {} paragraphs already translated", cache.len());
    }

    let output = output.unwrap_or_else(|| {
        config
            .cache_dir
            .join(format!("translated_{}.epub", book_id))
    });

    // Ctrl-C requests a cooperative stop; the current batch drains first.
    let cancel = CancelToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nStop requested, finishing the current batch...");
            ctrl_c_cancel.request_stop();
        }
    });

    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap()
        .progress_chars("=>-"));

    let progress_bar = pb.clone();
    let callback = move |p: &Progress| {
        progress_bar.set_length(p.total_pending as u64);
        progress_bar.set_position(p.translated as u64);
        progress_bar.set_message(format!(
            "${:.4} | ~{}s left",
            p.cost_so_far,
            p.remaining.as_secs()
        ));
    };

    let translator = Arc::new(DeepSeekTranslator::new(config.clone())?);
    let mut dispatcher = Dispatcher::new(translator, cache, config.max_concurrent);
    let translated = dispatcher
        .translate_all(&book, &cancel, Some(&callback))
        .await?;

    pb.finish_with_message("Completed");

    let exported = export_translated_epub(&book, dispatcher.cache(), &output)?;

    let duration = start_time.elapsed();
    let translated_paragraphs: usize = translated
        .values()
        .map(|chapter| chapter.iter().filter(|slot| slot.is_some()).count())
        .sum();

    if cancel.is_stop_requested() {
        println!("\n⚠️  Translation stopped early (progress saved to cache)");
    } else {
        println!("\n✅ Translation completed!");
    }
    println!("   Paragraphs resolved: {}", translated_paragraphs);
    println!("   Cached translations: {}", dispatcher.cache().len());
    println!("   Output: {}", exported.display());
    println!("   Time: {:?}", duration);

    Ok(())
}

/// Handle the estimate command
pub async fn handle_estimate(file: PathBuf) -> anyhow::Result<()> {
    use crate::processors::epub::Book;

    let book = Book::open(&file)?;
    print_book_stats(&book);

    Ok(())
}

/// Handle the reset-cache command
pub async fn handle_reset_cache(file: PathBuf) -> anyhow::Result<()> {
    use crate::core::cache::TranslationCache;
    use crate::core::config::TranslatorConfig;
    use crate::processors::epub::Book;

    let config = TranslatorConfig::load()?;
    let book = Book::open(&file)?;
    let book_id = book.book_id();

    let mut cache = TranslationCache::load(&config.cache_dir, &book_id)?;
    let entries = cache.len();
    cache.reset()?;

    println!("✅ Cleared {} cached translations for book {}", entries, book_id);

    Ok(())
}

/// Print book statistics and the upfront cost estimate
fn print_book_stats(book: &crate::processors::epub::Book) {
    use crate::core::pricing::{estimate_total_cost, time_until_saver_mode, Tier};

    let words = book.word_count();
    let (cost, tier) = estimate_total_cost(words);

    println!("\n📖 {}", book.title().unwrap_or("Untitled"));
    if let Some(author) = book.author() {
        println!("   Author: {}", author);
    }
    println!("   Chapters: {}", book.num_chapters());
    println!("   Paragraphs: {}", book.num_paragraphs());
    println!("   Words: {}", words);
    println!("   Estimated cost: ${:.4} ({} tier)", cost, tier);

    if tier == Tier::Discount {
        println!("   Saver mode active (50% discount)");
    } else if let Some(delta) = time_until_saver_mode() {
        let hours = delta.num_minutes() / 60;
        let minutes = delta.num_minutes() % 60;
        println!("   Saver mode starts in {}h {}min (UTC 16:30)", hours, minutes);
    }
}
