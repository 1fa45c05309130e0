//! Request extractors

use crate::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use newswire_common::{auth, errors::AppError};

/// Authenticated user extracted from a Bearer JWT
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub user_id: i64,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = auth::extract_bearer_token(header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must carry a Bearer token".to_string(),
        })?;

        let user_id = state.jwt.user_id_from_token(token)?;

        Ok(CurrentUser { user_id })
    }
}
