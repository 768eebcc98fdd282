//! Batch translation dispatcher
//!
//! Walks a paragraph source in document order, skips everything the cache
//! already holds, and fans the rest out to the remote translator in batches
//! of `max_concurrent`. Batches are barriers: batch N fully resolves before
//! batch N+1 is dispatched, and cancellation is only observed between
//! batches. Output slots are filled by original position, so the returned
//! chapters are always in source order no matter how completions interleave.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::core::cache::TranslationCache;
use crate::core::client::Translate;
use crate::core::errors::Result;
use crate::core::models::{ContentAddress, ParagraphSource, Progress};
use crate::core::pricing::estimate_total_cost;

/// Progress callback invoked after every completed work item. Expected to be
/// fast and non-blocking; presentation belongs to the caller.
pub type ProgressFn = dyn Fn(&Progress) + Send + Sync;

/// Cooperative cancellation handle. Cloneable; any holder may request a
/// stop at any time. The dispatcher observes it at batch boundaries only,
/// so an in-flight batch always drains.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    stop: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh token with no stop requested
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the dispatcher to stop before its next batch
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested
    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// One unique untranslated paragraph, with every output slot waiting on it.
/// Duplicate paragraphs in a chapter share an address and therefore a single
/// work item; only the first occurrence is ever dispatched.
struct WorkItem {
    address: ContentAddress,
    text: String,
    slots: Vec<(usize, usize)>,
}

/// Per-chapter output in source order. `None` marks a slot whose batch was
/// never dispatched because the run was cancelled.
pub type TranslatedChapters = BTreeMap<usize, Vec<Option<String>>>;

/// Orchestrates the translate-all pipeline over a paragraph source.
pub struct Dispatcher {
    translator: Arc<dyn Translate>,
    cache: TranslationCache,
    max_concurrent: usize,
}

impl Dispatcher {
    /// Create a dispatcher. `max_concurrent` is clamped to at least 1;
    /// 1 degenerates to strictly sequential dispatch.
    pub fn new(
        translator: Arc<dyn Translate>,
        cache: TranslationCache,
        max_concurrent: usize,
    ) -> Self {
        Self {
            translator,
            cache,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// The cache as updated by completed runs
    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Consume the dispatcher and hand the cache back
    pub fn into_cache(self) -> TranslationCache {
        self.cache
    }

    /// Translate every paragraph of the source, in batches.
    ///
    /// Returns one entry per chapter, each a vector with exactly one slot per
    /// source paragraph in source order. Cache hits and blank paragraphs
    /// resolve immediately; the rest are dispatched batch by batch until the
    /// queue is exhausted or `cancel` fires.
    pub async fn translate_all(
        &mut self,
        source: &dyn ParagraphSource,
        cancel: &CancelToken,
        progress: Option<&ProgressFn>,
    ) -> Result<TranslatedChapters> {
        let chapters = source.chapters();

        let mut output: TranslatedChapters = BTreeMap::new();
        let mut queue: Vec<WorkItem> = Vec::new();
        let mut queued: HashMap<ContentAddress, usize> = HashMap::new();

        // Pre-pass in document order: resolve hits and blanks, queue the
        // rest. Duplicate addresses register extra slots on the existing
        // item instead of a second dispatch.
        for (chapter_index, paragraphs) in chapters.iter().enumerate() {
            let slots = output.entry(chapter_index).or_default();
            for (paragraph_index, paragraph) in paragraphs.iter().enumerate() {
                if paragraph.trim().is_empty() {
                    slots.push(Some(String::new()));
                    continue;
                }
                let address = ContentAddress::derive(chapter_index, paragraph);
                if let Some(hit) = self.cache.get(&address) {
                    slots.push(Some(hit.to_string()));
                    continue;
                }
                slots.push(None);
                if let Some(&item_index) = queued.get(&address) {
                    queue[item_index].slots.push((chapter_index, paragraph_index));
                } else {
                    queued.insert(address.clone(), queue.len());
                    queue.push(WorkItem {
                        address,
                        text: paragraph.clone(),
                        slots: vec![(chapter_index, paragraph_index)],
                    });
                }
            }
        }

        let total_pending = queue.len();
        info!(
            "Dispatching {} unique paragraphs ({} already cached)",
            total_pending,
            self.cache.len()
        );

        let start_time = Instant::now();
        let mut translated_count = 0usize;

        for batch in queue.chunks(self.max_concurrent) {
            if cancel.is_stop_requested() {
                info!(
                    "Stop requested, halting after {}/{} paragraphs",
                    translated_count, total_pending
                );
                break;
            }

            // One task per item; awaiting every handle is the batch barrier.
            let handles: Vec<_> = batch
                .iter()
                .map(|item| {
                    let translator = Arc::clone(&self.translator);
                    let text = item.text.clone();
                    tokio::spawn(async move { translator.translate(&text).await })
                })
                .collect();

            let mut results = Vec::with_capacity(handles.len());
            for handle in handles {
                results.push(handle.await);
            }

            for (item, joined) in batch.iter().zip(results) {
                let text = match joined {
                    Ok(Ok(translation)) => {
                        self.cache.put(item.address.clone(), translation.clone());
                        if let Err(e) = self.cache.persist() {
                            warn!("Failed to persist cache: {}", e);
                        }
                        translation
                    }
                    Ok(Err(e)) => {
                        // Not cached: the paragraph is retried on the next
                        // run instead of freezing the failure into the book.
                        debug!("Translation failed for {}: {}", item.address, e);
                        format!("Error during translation: {}", e)
                    }
                    Err(e) => format!("Error during translation: {}", e),
                };

                for &(chapter_index, paragraph_index) in &item.slots {
                    if let Some(slots) = output.get_mut(&chapter_index) {
                        slots[paragraph_index] = Some(text.clone());
                    }
                }

                translated_count += 1;
                if let Some(callback) = progress {
                    callback(&self.report(translated_count, total_pending, start_time));
                }
            }
        }

        Ok(output)
    }

    /// Snapshot progress after a completed item. Remaining time is a linear
    /// extrapolation from the rate so far.
    fn report(&self, translated: usize, total_pending: usize, start_time: Instant) -> Progress {
        let elapsed = start_time.elapsed();
        let remaining = if total_pending > 0 && translated > 0 {
            let fraction = translated as f64 / total_pending as f64;
            let est_total = elapsed.as_secs_f64() / fraction;
            Duration::from_secs_f64((est_total - elapsed.as_secs_f64()).max(0.0))
        } else {
            Duration::ZERO
        };

        let (cost_so_far, _) = estimate_total_cost(self.cache.word_count());

        Progress {
            translated,
            total_pending,
            cost_so_far,
            elapsed,
            remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::TranslationError;
    use crate::core::models::BookId;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct Chapters(Vec<Vec<&'static str>>);

    impl ParagraphSource for Chapters {
        fn chapters(&self) -> Vec<Vec<String>> {
            self.0
                .iter()
                .map(|c| c.iter().map(|p| p.to_string()).collect())
                .collect()
        }
    }

    /// Stub translator: prefixes "[FR] ", records call events, and can
    /// delay or fail per paragraph.
    struct StubTranslator {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
        events: Mutex<Vec<String>>,
        delays_ms: HashMap<String, u64>,
        fail_on: Option<String>,
        cancel_after_first: Option<CancelToken>,
    }

    impl StubTranslator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
                events: Mutex::new(Vec::new()),
                delays_ms: HashMap::new(),
                fail_on: None,
                cancel_after_first: None,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Translate for StubTranslator {
        async fn translate(&self, text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            self.events.lock().unwrap().push(format!("start:{}", text));

            if let Some(ms) = self.delays_ms.get(text) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }

            if let Some(token) = &self.cancel_after_first {
                token.request_stop();
            }

            self.events.lock().unwrap().push(format!("end:{}", text));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on.as_deref() == Some(text) {
                return Err(TranslationError::NetworkError {
                    message: "connection reset".to_string(),
                });
            }
            Ok(format!("[FR] {}", text))
        }
    }

    fn dispatcher_with(
        dir: &tempfile::TempDir,
        stub: Arc<StubTranslator>,
        max_concurrent: usize,
    ) -> Dispatcher {
        let cache = TranslationCache::load(dir.path(), &BookId::new("book")).unwrap();
        Dispatcher::new(stub, cache, max_concurrent)
    }

    #[tokio::test]
    async fn test_example_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubTranslator::new());
        let mut dispatcher = dispatcher_with(&dir, Arc::clone(&stub), 5);

        let source = Chapters(vec![vec!["Hello world.", "", "Hello world."]]);
        let progress_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&progress_calls);
        let callback = move |_p: &Progress| {
            counter.fetch_add(1, Ordering::SeqCst);
        };

        let result = dispatcher
            .translate_all(&source, &CancelToken::new(), Some(&callback))
            .await
            .unwrap();

        let chapter: Vec<_> = result[&0].iter().map(|s| s.clone().unwrap()).collect();
        assert_eq!(chapter, vec!["[FR] Hello world.", "", "[FR] Hello world."]);

        // Two identical paragraphs share one address: one call, one entry.
        assert_eq!(stub.call_count(), 1);
        assert_eq!(dispatcher.cache().len(), 1);
        assert_eq!(progress_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_idempotent_second_run() {
        let dir = tempfile::tempdir().unwrap();
        let source = Chapters(vec![vec!["One", "Two"], vec!["Three"]]);

        let stub = Arc::new(StubTranslator::new());
        let mut dispatcher = dispatcher_with(&dir, Arc::clone(&stub), 2);
        let first = dispatcher
            .translate_all(&source, &CancelToken::new(), None)
            .await
            .unwrap();
        assert_eq!(stub.call_count(), 3);

        // Fresh dispatcher over the persisted cache: no further calls.
        let stub2 = Arc::new(StubTranslator::new());
        let mut dispatcher2 = dispatcher_with(&dir, Arc::clone(&stub2), 2);
        let second = dispatcher2
            .translate_all(&source, &CancelToken::new(), None)
            .await
            .unwrap();

        assert_eq!(stub2.call_count(), 0);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_order_preserved_despite_completion_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut stub = StubTranslator::new();
        // First paragraph finishes last within its batch.
        stub.delays_ms.insert("Alpha".to_string(), 80);
        stub.delays_ms.insert("Beta".to_string(), 10);
        stub.delays_ms.insert("Gamma".to_string(), 30);
        let stub = Arc::new(stub);

        let mut dispatcher = dispatcher_with(&dir, Arc::clone(&stub), 3);
        let source = Chapters(vec![vec!["Alpha", "Beta", "Gamma"]]);
        let result = dispatcher
            .translate_all(&source, &CancelToken::new(), None)
            .await
            .unwrap();

        let chapter: Vec<_> = result[&0].iter().map(|s| s.clone().unwrap()).collect();
        assert_eq!(chapter, vec!["[FR] Alpha", "[FR] Beta", "[FR] Gamma"]);

        // Beta really did complete before Alpha.
        let events = stub.events();
        let end_beta = events.iter().position(|e| e == "end:Beta").unwrap();
        let end_alpha = events.iter().position(|e| e == "end:Alpha").unwrap();
        assert!(end_beta < end_alpha);
    }

    #[tokio::test]
    async fn test_batch_barrier() {
        let dir = tempfile::tempdir().unwrap();
        let mut stub = StubTranslator::new();
        for p in ["P1", "P2", "P3", "P4", "P5"] {
            stub.delays_ms.insert(p.to_string(), 20);
        }
        let stub = Arc::new(stub);

        let mut dispatcher = dispatcher_with(&dir, Arc::clone(&stub), 2);
        let source = Chapters(vec![vec!["P1", "P2", "P3", "P4", "P5"]]);
        dispatcher
            .translate_all(&source, &CancelToken::new(), None)
            .await
            .unwrap();

        assert!(stub.peak_in_flight.load(Ordering::SeqCst) <= 2);

        // No batch-2 item starts before every batch-1 item has ended.
        let events = stub.events();
        let start_p3 = events.iter().position(|e| e == "start:P3").unwrap();
        let end_p1 = events.iter().position(|e| e == "end:P1").unwrap();
        let end_p2 = events.iter().position(|e| e == "end:P2").unwrap();
        assert!(end_p1 < start_p3);
        assert!(end_p2 < start_p3);
    }

    #[tokio::test]
    async fn test_cancellation_is_batch_granular() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        let mut stub = StubTranslator::new();
        stub.cancel_after_first = Some(cancel.clone());
        let stub = Arc::new(stub);

        let mut dispatcher = dispatcher_with(&dir, Arc::clone(&stub), 2);
        let source = Chapters(vec![vec!["P1", "P2", "P3", "P4", "P5"]]);
        let result = dispatcher.translate_all(&source, &cancel, None).await.unwrap();

        // Batch 1 drains fully, later batches are never dispatched.
        assert_eq!(stub.call_count(), 2);
        let chapter = &result[&0];
        assert_eq!(chapter[0], Some("[FR] P1".to_string()));
        assert_eq!(chapter[1], Some("[FR] P2".to_string()));
        assert_eq!(chapter[2], None);
        assert_eq!(chapter[3], None);
        assert_eq!(chapter[4], None);
        assert_eq!(dispatcher.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_item_failure_is_local_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut stub = StubTranslator::new();
        stub.fail_on = Some("Bad".to_string());
        let stub = Arc::new(stub);

        let mut dispatcher = dispatcher_with(&dir, Arc::clone(&stub), 3);
        let source = Chapters(vec![vec!["Good", "Bad", "Fine"]]);
        let result = dispatcher
            .translate_all(&source, &CancelToken::new(), None)
            .await
            .unwrap();

        let chapter = &result[&0];
        assert_eq!(chapter[0], Some("[FR] Good".to_string()));
        assert!(chapter[1].as_ref().unwrap().starts_with("Error during translation:"));
        assert_eq!(chapter[2], Some("[FR] Fine".to_string()));

        // The failure is not frozen into the cache; a second run retries it.
        assert_eq!(dispatcher.cache().len(), 2);
        let stub2 = Arc::new(StubTranslator::new());
        let mut dispatcher2 = dispatcher_with(&dir, Arc::clone(&stub2), 3);
        let second = dispatcher2
            .translate_all(&source, &CancelToken::new(), None)
            .await
            .unwrap();
        assert_eq!(stub2.call_count(), 1);
        assert_eq!(second[&0][1], Some("[FR] Bad".to_string()));
    }

    #[tokio::test]
    async fn test_sequential_degenerate_case() {
        let dir = tempfile::tempdir().unwrap();
        let mut stub = StubTranslator::new();
        stub.delays_ms.insert("P1".to_string(), 10);
        stub.delays_ms.insert("P2".to_string(), 10);
        let stub = Arc::new(stub);

        let mut dispatcher = dispatcher_with(&dir, Arc::clone(&stub), 1);
        let source = Chapters(vec![vec!["P1", "P2"]]);
        dispatcher
            .translate_all(&source, &CancelToken::new(), None)
            .await
            .unwrap();

        assert_eq!(stub.peak_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(
            stub.events(),
            vec!["start:P1", "end:P1", "start:P2", "end:P2"]
        );
    }

    #[tokio::test]
    async fn test_progress_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubTranslator::new());
        let mut dispatcher = dispatcher_with(&dir, Arc::clone(&stub), 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback = move |p: &Progress| {
            sink.lock().unwrap().push((p.translated, p.total_pending));
        };

        let source = Chapters(vec![vec!["P1", "P2", "P3"]]);
        dispatcher
            .translate_all(&source, &CancelToken::new(), Some(&callback))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_blank_paragraphs_skip_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubTranslator::new());
        let mut dispatcher = dispatcher_with(&dir, Arc::clone(&stub), 4);

        let source = Chapters(vec![vec!["", "   ", "Text", "\t"]]);
        let result = dispatcher
            .translate_all(&source, &CancelToken::new(), None)
            .await
            .unwrap();

        assert_eq!(stub.call_count(), 1);
        let chapter = &result[&0];
        assert_eq!(chapter[0], Some(String::new()));
        assert_eq!(chapter[1], Some(String::new()));
        assert_eq!(chapter[2], Some("[FR] Text".to_string()));
        assert_eq!(chapter[3], Some(String::new()));
        assert_eq!(dispatcher.cache().len(), 1);
    }
}
