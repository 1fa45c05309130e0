//! News aggregation provider client
//!
//! Speaks the NewsAPI v2 wire format: `/top-headlines` and `/everything`
//! with an `apiKey` query parameter, returning `status`, `totalResults`
//! and `articles[]`.

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Query parameters for a top-headlines fetch
#[derive(Debug, Clone)]
pub struct HeadlinesQuery {
    pub category: Option<String>,
    pub country: String,
    pub page: u32,
    pub page_size: u32,
}

impl Default for HeadlinesQuery {
    fn default() -> Self {
        Self {
            category: None,
            country: "us".to_string(),
            page: 1,
            page_size: 20,
        }
    }
}

/// Query parameters for a free-text news search
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub page: u32,
    pub page_size: u32,
    pub from_date: Option<String>,
}

/// Provider payload for a headline or search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsResponse {
    pub status: String,
    #[serde(rename = "totalResults", default)]
    pub total_results: u64,
    #[serde(default)]
    pub articles: Vec<ProviderArticle>,
}

/// A single article as returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderArticle {
    #[serde(default)]
    pub source: ArticleSource,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
}

/// Source attribution of a provider article
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// HTTP client for the news provider
pub struct NewsClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl NewsClient {
    /// Create a new client against the given base URL
    pub fn new(api_key: String, base_url: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build news HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    /// Fetch top headlines for a country, optionally narrowed to a category
    pub async fn top_headlines(&self, query: &HeadlinesQuery) -> Result<NewsResponse> {
        let url = format!("{}/top-headlines", self.base_url);

        let mut params: Vec<(&str, String)> = vec![
            ("apiKey", self.api_key.clone()),
            ("country", query.country.clone()),
            ("page", query.page.to_string()),
            ("pageSize", query.page_size.to_string()),
        ];
        if let Some(ref category) = query.category {
            params.push(("category", category.clone()));
        }

        self.fetch(&url, &params).await
    }

    /// Free-text search across everything, newest first
    pub async fn search(&self, query: &SearchQuery) -> Result<NewsResponse> {
        let url = format!("{}/everything", self.base_url);

        let mut params: Vec<(&str, String)> = vec![
            ("apiKey", self.api_key.clone()),
            ("q", query.query.clone()),
            ("page", query.page.to_string()),
            ("pageSize", query.page_size.to_string()),
            ("sortBy", "publishedAt".to_string()),
        ];
        if let Some(ref from_date) = query.from_date {
            params.push(("from", from_date.clone()));
        }

        self.fetch(&url, &params).await
    }

    async fn fetch(&self, url: &str, params: &[(&str, String)]) -> Result<NewsResponse> {
        let response = self.client.get(url).query(params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NewsProvider {
                status,
                message: body,
            });
        }

        response.json::<NewsResponse>().await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parses_provider_payload() {
        let payload = r#"{
            "status": "ok",
            "totalResults": 2,
            "articles": [
                {
                    "source": {"id": "example-wire", "name": "Example Wire"},
                    "author": "A. Reporter",
                    "title": "Headline",
                    "description": "Short description",
                    "url": "https://example.com/a",
                    "urlToImage": "https://example.com/a.jpg",
                    "publishedAt": "2026-01-02T03:04:05Z",
                    "content": "Body text"
                },
                {
                    "source": {"id": null, "name": null},
                    "author": null,
                    "title": null,
                    "description": null,
                    "url": "https://example.com/b",
                    "urlToImage": null,
                    "publishedAt": null,
                    "content": null
                }
            ]
        }"#;

        let parsed: NewsResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.status, "ok");
        assert_eq!(parsed.total_results, 2);
        assert_eq!(parsed.articles.len(), 2);
        assert_eq!(parsed.articles[0].source.name.as_deref(), Some("Example Wire"));
        assert_eq!(parsed.articles[0].url_to_image.as_deref(), Some("https://example.com/a.jpg"));
        assert!(parsed.articles[1].title.is_none());
    }

    #[test]
    fn test_response_tolerates_missing_articles() {
        let parsed: NewsResponse = serde_json::from_str(r#"{"status": "ok"}"#).unwrap();
        assert_eq!(parsed.total_results, 0);
        assert!(parsed.articles.is_empty());
    }
}
