//! Article summary orchestration
//!
//! The fetch-or-generate chain for summaries: cache, then durable store,
//! then the generative provider, with write-back to both. A per-article
//! in-flight guard keeps concurrent uncached requests from each paying for
//! their own generation.

use crate::cache::{keys, Cache};
use crate::errors::{AppError, Result};
use crate::metrics::{record_cache, record_generation};
use crate::providers::generative::TextGenerator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::info;

/// Cache TTL for generated summaries
pub const SUMMARY_TTL_SECS: u64 = 86_400;

/// Minimum trimmed article content length accepted for summarization
pub const MIN_CONTENT_CHARS: usize = 50;

/// Minimum trimmed length of a usable generated summary
pub const MIN_SUMMARY_CHARS: usize = 20;

/// How much article content is handed to the generator
pub const PROMPT_CONTENT_CHARS: usize = 5000;

/// Durable storage seam for summaries
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Look up the persisted summary for an article
    async fn find_summary(&self, article_id: i64) -> Result<Option<String>>;

    /// Persist a summary, returning the stored text
    ///
    /// When another writer got there first, the winning row's text comes
    /// back instead.
    async fn store_summary(&self, article_id: i64, summary: &str) -> Result<String>;
}

/// Orchestrates the summary fetch-or-generate chain
#[derive(Clone)]
pub struct SummaryService {
    cache: Cache,
    store: Arc<dyn SummaryStore>,
    generator: Arc<dyn TextGenerator>,
    in_flight: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl SummaryService {
    /// Create a new service owning its store, generator, and cache handle
    pub fn new(cache: Cache, store: Arc<dyn SummaryStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            cache,
            store,
            generator,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Summarize an article, reusing the cached or persisted summary when
    /// one exists
    pub async fn summarize(&self, article_id: i64, content: &str) -> Result<String> {
        if content.trim().chars().count() < MIN_CONTENT_CHARS {
            return Err(AppError::Validation {
                message: "Article content is too short or empty for summarization".to_string(),
                field: Some("content".to_string()),
            });
        }

        let key = keys::article_summary(article_id);

        if let Some(cached) = self.cache.get_raw(&key).await? {
            record_cache(true, "summary");
            info!(article_id, "Returning cached summary");
            return Ok(cached);
        }
        record_cache(false, "summary");

        // Serialize uncached requests for the same article within this
        // process; the unique index on article_id covers everything else.
        let guard = self.guard_for(article_id).await;
        let held = guard.lock().await;
        let result = self.resolve_uncached(article_id, content, &key).await;
        drop(held);
        self.release_guard(article_id, guard).await;

        result
    }

    /// Durable-store lookup, then generation, then write-back
    async fn resolve_uncached(&self, article_id: i64, content: &str, key: &str) -> Result<String> {
        // A request that held the guard before us may have populated the
        // cache already.
        if let Some(cached) = self.cache.get_raw(key).await? {
            return Ok(cached);
        }

        if let Some(existing) = self.store.find_summary(article_id).await? {
            self.cache.set_raw(key, &existing, SUMMARY_TTL_SECS).await?;
            info!(article_id, "Returning persisted summary");
            return Ok(existing);
        }

        info!(article_id, "Generating new summary");
        let start = Instant::now();
        let generated = self.generator.generate(&build_prompt(content)).await;
        record_generation(
            start.elapsed().as_secs_f64(),
            self.generator.model_name(),
            generated.is_ok(),
        );
        let generated = generated?;

        let generated = generated.trim();
        if generated.chars().count() < MIN_SUMMARY_CHARS {
            return Err(AppError::Generation {
                message: "Generated summary is too short".to_string(),
            });
        }

        let stored = self.store.store_summary(article_id, generated).await?;
        self.cache.set_raw(key, &stored, SUMMARY_TTL_SECS).await?;
        info!(article_id, "Summary generated and cached");

        Ok(stored)
    }

    async fn guard_for(&self, article_id: i64) -> Arc<Mutex<()>> {
        let mut map = self.in_flight.lock().await;
        map.entry(article_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn release_guard(&self, article_id: i64, guard: Arc<Mutex<()>>) {
        drop(guard);
        let mut map = self.in_flight.lock().await;
        if let Some(entry) = map.get(&article_id) {
            // Only the map still holds it: no other request is waiting
            if Arc::strong_count(entry) == 1 {
                map.remove(&article_id);
            }
        }
    }
}

fn build_prompt(content: &str) -> String {
    let excerpt: String = content.chars().take(PROMPT_CONTENT_CHARS).collect();
    format!(
        "Please provide a concise summary of the following news article in 3-4 sentences. \
         Focus on the key points and main takeaways:\n\n{}\n\nSummary:",
        excerpt
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use crate::providers::generative::MockGenerator;
    use std::collections::HashMap as StdHashMap;

    /// In-memory summary store for tests
    #[derive(Default)]
    struct MemoryStore {
        rows: std::sync::Mutex<StdHashMap<i64, String>>,
    }

    #[async_trait]
    impl SummaryStore for MemoryStore {
        async fn find_summary(&self, article_id: i64) -> Result<Option<String>> {
            Ok(self.rows.lock().unwrap().get(&article_id).cloned())
        }

        async fn store_summary(&self, article_id: i64, summary: &str) -> Result<String> {
            let mut rows = self.rows.lock().unwrap();
            let stored = rows
                .entry(article_id)
                .or_insert_with(|| summary.to_string());
            Ok(stored.clone())
        }
    }

    const GOOD_SUMMARY: &str = "This article covers the key points in a few sentences.";

    fn long_content() -> String {
        "word ".repeat(40)
    }

    fn service(
        generator: Arc<MockGenerator>,
    ) -> (SummaryService, Cache, Arc<MemoryStore>) {
        let cache = Cache::new(Arc::new(MemoryBackend::new()));
        let store = Arc::new(MemoryStore::default());
        let service = SummaryService::new(cache.clone(), store.clone(), generator);
        (service, cache, store)
    }

    #[tokio::test]
    async fn test_short_content_never_reaches_provider() {
        let generator = Arc::new(MockGenerator::new(GOOD_SUMMARY));
        let (service, _, _) = service(generator.clone());

        let err = service.summarize(1, "   too short   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_exactly_50_chars_accepted() {
        let generator = Arc::new(MockGenerator::new(GOOD_SUMMARY));
        let (service, _, _) = service(generator.clone());

        let content = "x".repeat(50);
        let summary = service.summarize(1, &content).await.unwrap();
        assert_eq!(summary, GOOD_SUMMARY);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_second_summarize_served_without_provider_call() {
        let generator = Arc::new(MockGenerator::new(GOOD_SUMMARY));
        let (service, _, _) = service(generator.clone());
        let content = long_content();

        let first = service.summarize(7, &content).await.unwrap();
        let second = service.summarize(7, &content).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_persisted_summary_backfills_cache() {
        let generator = Arc::new(MockGenerator::new(GOOD_SUMMARY));
        let (service, cache, store) = service(generator.clone());
        store
            .store_summary(3, "Previously persisted summary text.")
            .await
            .unwrap();

        let summary = service.summarize(3, &long_content()).await.unwrap();
        assert_eq!(summary, "Previously persisted summary text.");
        assert_eq!(generator.call_count(), 0);

        // Cache now holds the durable copy
        let cached = cache.get_raw(&keys::article_summary(3)).await.unwrap();
        assert_eq!(cached.as_deref(), Some("Previously persisted summary text."));
    }

    #[tokio::test]
    async fn test_too_short_generation_is_a_provider_error() {
        let generator = Arc::new(MockGenerator::new("nope"));
        let (service, _, store) = service(generator.clone());

        let err = service.summarize(9, &long_content()).await.unwrap_err();
        assert!(matches!(err, AppError::Generation { .. }));
        assert!(store.find_summary(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prompt_content_truncated_to_limit() {
        let generator = Arc::new(MockGenerator::new(GOOD_SUMMARY));
        let (service, _, _) = service(generator.clone());

        let content = "a".repeat(PROMPT_CONTENT_CHARS + 500);
        service.summarize(11, &content).await.unwrap();

        let prompt = generator.last_prompt().unwrap();
        let expected: String = content.chars().take(PROMPT_CONTENT_CHARS).collect();
        assert!(prompt.contains(&expected));
        assert!(!prompt.contains(&content));
    }

    #[tokio::test]
    async fn test_concurrent_requests_generate_once() {
        let generator = Arc::new(MockGenerator::new(GOOD_SUMMARY));
        let (service, _, _) = service(generator.clone());
        let content = long_content();

        let a = service.clone();
        let b = service.clone();
        let (content_a, content_b) = (content.clone(), content.clone());
        let (first, second) = tokio::join!(
            tokio::spawn(async move { a.summarize(5, &content_a).await }),
            tokio::spawn(async move { b.summarize(5, &content_b).await }),
        );

        assert_eq!(first.unwrap().unwrap(), GOOD_SUMMARY);
        assert_eq!(second.unwrap().unwrap(), GOOD_SUMMARY);
        assert_eq!(generator.call_count(), 1);
    }
}
