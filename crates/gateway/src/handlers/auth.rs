//! Account registration and login handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extract::CurrentUser, AppState};
use newswire_common::{
    auth,
    db::models::User,
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 3, max = 50))]
    pub username: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            full_name: user.full_name,
        }
    }
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    if state.repo.find_user_by_email(&request.email).await?.is_some() {
        return Err(AppError::Duplicate {
            message: "Email already registered".to_string(),
        });
    }
    if state
        .repo
        .find_user_by_username(&request.username)
        .await?
        .is_some()
    {
        return Err(AppError::Duplicate {
            message: "Username already taken".to_string(),
        });
    }

    let hashed = auth::hash_password(&request.password)?;
    let user = state
        .repo
        .create_user(request.email, request.username, Some(hashed), request.full_name)
        .await?;

    tracing::info!(user_id = user.id, "User registered");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Log in with email and password, returning an access token
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let user = state
        .repo
        .find_user_by_email(&request.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized {
            message: "Incorrect email or password".to_string(),
        })?;

    if !user.is_active {
        return Err(AppError::AccountDisabled);
    }

    let verified = user
        .hashed_password
        .as_deref()
        .is_some_and(|hash| auth::verify_password(&request.password, hash));
    if !verified {
        return Err(AppError::Unauthorized {
            message: "Incorrect email or password".to_string(),
        });
    }

    let access_token = state.jwt.generate_token(user.id)?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// Current account details
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> Result<Json<UserResponse>> {
    let account = state
        .repo
        .find_user_by_id(user.user_id)
        .await?
        .ok_or_else(|| AppError::UserNotFound {
            id: user.user_id.to_string(),
        })?;

    Ok(Json(account.into()))
}
