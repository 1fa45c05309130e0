//! News handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extract::CurrentUser, AppState};
use newswire_common::{
    db::{models::Article, NewArticle},
    errors::{AppError, Result},
    providers::news::{ArticleSource, HeadlinesQuery, NewsResponse, SearchQuery},
};

fn default_country() -> String {
    "us".to_string()
}
fn default_page() -> u32 {
    1
}
fn default_page_size() -> u32 {
    20
}
fn default_limit() -> u64 {
    20
}

/// Query parameters for the headlines endpoint
#[derive(Debug, Deserialize, Validate)]
pub struct HeadlinesParams {
    /// Category: business, entertainment, general, health, science,
    /// sports, technology
    pub category: Option<String>,

    #[serde(default = "default_country")]
    pub country: String,

    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: u32,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100))]
    pub page_size: u32,
}

/// Query parameters for the search endpoint
#[derive(Debug, Deserialize, Validate)]
pub struct SearchParams {
    /// Search query
    #[validate(length(min = 1))]
    pub q: String,

    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: u32,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100))]
    pub page_size: u32,

    /// From date (YYYY-MM-DD)
    pub from_date: Option<String>,
}

/// Request body for saving an article, in the provider's payload shape
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveArticleRequest {
    #[serde(default)]
    pub source: ArticleSource,

    pub author: Option<String>,

    #[validate(length(min = 1, max = 1000))]
    pub title: String,

    pub description: Option<String>,

    #[validate(length(min = 1, max = 2000))]
    pub url: String,

    pub url_to_image: Option<String>,

    pub published_at: Option<String>,

    pub content: Option<String>,

    pub category: Option<String>,
}

#[derive(Serialize)]
pub struct SaveArticleResponse {
    pub message: String,
    pub saved_article_id: i64,
    pub article_id: i64,
}

/// Pagination for the saved-articles listing
#[derive(Debug, Deserialize, Validate)]
pub struct SavedParams {
    #[serde(default)]
    pub skip: u64,

    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u64,
}

#[derive(Serialize)]
pub struct ArticleResponse {
    pub id: i64,
    pub source_name: Option<String>,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            source_name: article.source_name,
            author: article.author,
            title: article.title,
            description: article.description,
            url: article.url,
            url_to_image: article.url_to_image,
            published_at: article.published_at.map(|dt| dt.to_rfc3339()),
            content: article.content,
            category: article.category,
        }
    }
}

#[derive(Serialize)]
pub struct SavedArticleResponse {
    pub id: i64,
    pub article: ArticleResponse,
    pub saved_at: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Fetch top headlines (cache-first)
pub async fn get_headlines(
    State(state): State<AppState>,
    Query(params): Query<HeadlinesParams>,
) -> Result<Json<NewsResponse>> {
    params.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let query = HeadlinesQuery {
        category: params.category,
        country: params.country,
        page: params.page,
        page_size: params.page_size,
    };

    let response = state.news.top_headlines(&query).await?;
    Ok(Json(response))
}

/// Search news by free text (cache-first)
pub async fn search_news(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<NewsResponse>> {
    params.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let query = SearchQuery {
        query: params.q,
        page: params.page,
        page_size: params.page_size,
        from_date: params.from_date,
    };

    let response = state.news.search(&query).await?;
    Ok(Json(response))
}

/// Persist an article and mark it saved for the current user
pub async fn save_article(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SaveArticleRequest>,
) -> Result<(StatusCode, Json<SaveArticleResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let published_at = request
        .published_at
        .as_deref()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok());

    let article = state
        .repo
        .get_or_create_article(NewArticle {
            source_id: request.source.id,
            source_name: request.source.name,
            author: request.author,
            title: request.title,
            description: request.description,
            url: request.url,
            url_to_image: request.url_to_image,
            published_at,
            content: request.content,
            category: request.category,
        })
        .await?;

    let saved = state.repo.save_for_user(user.user_id, article.id).await?;

    tracing::info!(
        user_id = user.user_id,
        article_id = article.id,
        "Article saved"
    );

    Ok((
        StatusCode::CREATED,
        Json(SaveArticleResponse {
            message: "Article saved successfully".to_string(),
            saved_article_id: saved.id,
            article_id: article.id,
        }),
    ))
}

/// List the current user's saved articles
pub async fn get_saved_articles(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<SavedParams>,
) -> Result<Json<Vec<SavedArticleResponse>>> {
    params.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let saved = state
        .repo
        .list_saved(user.user_id, params.skip, params.limit)
        .await?;

    let response = saved
        .into_iter()
        .filter_map(|(saved, article)| {
            article.map(|article| SavedArticleResponse {
                id: saved.id,
                article: article.into(),
                saved_at: saved.saved_at.to_rfc3339(),
            })
        })
        .collect();

    Ok(Json(response))
}

/// Remove an article from the current user's saved list
pub async fn remove_saved_article(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(article_id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    let removed = state.repo.remove_saved(user.user_id, article_id).await?;

    if !removed {
        return Err(AppError::NotFound {
            resource_type: "saved_article".to_string(),
            id: article_id.to_string(),
        });
    }

    Ok(Json(MessageResponse {
        message: "Article removed from saved".to_string(),
    }))
}
