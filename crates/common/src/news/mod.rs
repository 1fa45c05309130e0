//! News fetch orchestration
//!
//! Headline and search fetches go cache-first, then to the provider, and
//! the provider payload is written back with a short TTL. There is no
//! durable fallback on this path; the durable article table is populated
//! only when a user saves an article.

use crate::cache::{keys, Cache};
use crate::errors::Result;
use crate::metrics::{record_cache, record_provider};
use crate::providers::news::{HeadlinesQuery, NewsClient, NewsResponse, SearchQuery};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Orchestrates cached reads against the news provider
#[derive(Clone)]
pub struct NewsService {
    cache: Cache,
    client: Arc<NewsClient>,
    cache_ttl_secs: u64,
}

impl NewsService {
    /// Create a new service owning its provider client and cache handle
    pub fn new(cache: Cache, client: Arc<NewsClient>, cache_ttl_secs: u64) -> Self {
        Self {
            cache,
            client,
            cache_ttl_secs,
        }
    }

    /// Top headlines, cached per full parameter tuple
    pub async fn top_headlines(&self, query: &HeadlinesQuery) -> Result<NewsResponse> {
        let key = keys::headlines(
            query.category.as_deref(),
            &query.country,
            query.page,
            query.page_size,
        );

        if let Some(cached) = self.cache.get::<NewsResponse>(&key).await? {
            record_cache(true, "news");
            return Ok(cached);
        }
        record_cache(false, "news");

        let start = Instant::now();
        let result = self.client.top_headlines(query).await;
        record_provider(start.elapsed().as_secs_f64(), "top_headlines", result.is_ok());
        let response = result?;

        self.cache.set(&key, &response, self.cache_ttl_secs).await?;
        info!(
            country = %query.country,
            category = query.category.as_deref().unwrap_or("all"),
            results = response.articles.len(),
            "Headlines fetched from provider"
        );

        Ok(response)
    }

    /// Free-text search, cached per full parameter tuple
    pub async fn search(&self, query: &SearchQuery) -> Result<NewsResponse> {
        let key = keys::search(
            &query.query,
            query.page,
            query.page_size,
            query.from_date.as_deref(),
        );

        if let Some(cached) = self.cache.get::<NewsResponse>(&key).await? {
            record_cache(true, "news");
            return Ok(cached);
        }
        record_cache(false, "news");

        let start = Instant::now();
        let result = self.client.search(query).await;
        record_provider(start.elapsed().as_secs_f64(), "search", result.is_ok());
        let response = result?;

        self.cache.set(&key, &response, self.cache_ttl_secs).await?;
        info!(
            query = %query.query,
            results = response.articles.len(),
            "Search results fetched from provider"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;

    fn service_with_unreachable_provider(cache: Cache) -> NewsService {
        // Any provider call would fail against this address; cache hits must
        // never reach it.
        let client = NewsClient::new("test-key".into(), "http://127.0.0.1:9".into(), 1).unwrap();
        NewsService::new(cache, Arc::new(client), 600)
    }

    fn sample_response() -> NewsResponse {
        NewsResponse {
            status: "ok".into(),
            total_results: 1,
            articles: vec![],
        }
    }

    #[tokio::test]
    async fn test_headlines_served_from_cache_without_provider_call() {
        let cache = Cache::new(Arc::new(MemoryBackend::new()));
        let key = keys::headlines(Some("technology"), "us", 1, 20);
        cache.set(&key, &sample_response(), 600).await.unwrap();

        let service = service_with_unreachable_provider(cache);
        let query = HeadlinesQuery {
            category: Some("technology".into()),
            country: "us".into(),
            page: 1,
            page_size: 20,
        };

        let response = service.top_headlines(&query).await.unwrap();
        assert_eq!(response, sample_response());
    }

    #[tokio::test]
    async fn test_search_served_from_cache_without_provider_call() {
        let cache = Cache::new(Arc::new(MemoryBackend::new()));
        let key = keys::search("rust", 1, 20, None);
        cache.set(&key, &sample_response(), 600).await.unwrap();

        let service = service_with_unreachable_provider(cache);
        let query = SearchQuery {
            query: "rust".into(),
            page: 1,
            page_size: 20,
            from_date: None,
        };

        let response = service.search(&query).await.unwrap();
        assert_eq!(response.status, "ok");
    }

    #[tokio::test]
    async fn test_distinct_parameter_tuples_use_distinct_entries() {
        let cache = Cache::new(Arc::new(MemoryBackend::new()));
        let page_one = keys::headlines(Some("business"), "us", 1, 20);
        cache.set(&page_one, &sample_response(), 600).await.unwrap();

        // The page-2 tuple maps to a different key and stays a miss
        let page_two = keys::headlines(Some("business"), "us", 2, 20);
        assert!(cache.get::<NewsResponse>(&page_two).await.unwrap().is_none());
        assert!(cache.get::<NewsResponse>(&page_one).await.unwrap().is_some());
    }
}
