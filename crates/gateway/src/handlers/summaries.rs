//! Article summarization handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extract::CurrentUser, AppState};
use newswire_common::{
    db::models::Article,
    errors::{AppError, Result},
};

/// Request to summarize an article by URL
#[derive(Debug, Deserialize, Validate)]
pub struct SummarizeRequest {
    #[validate(length(min = 1, max = 2000))]
    pub article_url: String,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub summary: String,
    pub article_id: i64,
}

/// Summarize a previously saved article, looked up by URL
pub async fn summarize_by_url(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummaryResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    tracing::info!(
        user_id = user.user_id,
        url = %request.article_url,
        "Summarize request"
    );

    let article = state
        .repo
        .find_article_by_url(&request.article_url)
        .await?
        .ok_or_else(|| AppError::ArticleNotFound {
            id: request.article_url.clone(),
        })?;

    summarize_article(&state, article).await
}

/// Summarize an article by its ID
pub async fn summarize_by_id(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(article_id): Path<i64>,
) -> Result<Json<SummaryResponse>> {
    tracing::info!(user_id = user.user_id, article_id, "Summarize request");

    let article = state
        .repo
        .find_article_by_id(article_id)
        .await?
        .ok_or_else(|| AppError::ArticleNotFound {
            id: article_id.to_string(),
        })?;

    summarize_article(&state, article).await
}

async fn summarize_article(state: &AppState, article: Article) -> Result<Json<SummaryResponse>> {
    let content = article.content.as_deref().unwrap_or("");
    if content.trim().is_empty() {
        return Err(AppError::Validation {
            message: "Article content not available for summarization".to_string(),
            field: Some("content".to_string()),
        });
    }

    let summary = state.summaries.summarize(article.id, content).await?;

    Ok(Json(SummaryResponse {
        summary,
        article_id: article.id,
    }))
}
