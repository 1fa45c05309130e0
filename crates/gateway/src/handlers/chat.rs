//! Chat handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{extract::CurrentUser, AppState};
use newswire_common::{
    errors::{AppError, Result},
    providers::generative::ConversationTurn,
};

/// Request body for a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,

    /// Caller-supplied history; when absent the cached history is used
    #[serde(default)]
    pub conversation_history: Option<Vec<ConversationTurn>>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_history: Vec<ConversationTurn>,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct ChatHistoryResponse {
    pub conversation_history: Vec<ConversationTurn>,
    pub user_id: i64,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Send a message to the news assistant
pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    // An empty supplied history means "start over", same as none at all
    let history = request.conversation_history.filter(|h| !h.is_empty());

    let outcome = state.chat.send(user.user_id, &request.message, history).await?;

    Ok(Json(ChatResponse {
        response: outcome.response,
        conversation_history: outcome.history,
        timestamp: outcome.timestamp,
    }))
}

/// Get the cached conversation history for the current user
pub async fn get_history(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Json<ChatHistoryResponse> {
    let history = state.chat.history(user.user_id).await;

    Json(ChatHistoryResponse {
        conversation_history: history,
        user_id: user.user_id,
    })
}

/// Clear the conversation history for the current user
pub async fn clear_history(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MessageResponse>> {
    if state.chat.clear(user.user_id).await {
        Ok(Json(MessageResponse {
            message: "Chat history cleared successfully".to_string(),
        }))
    } else {
        Err(AppError::Internal {
            message: "Failed to clear chat history".to_string(),
        })
    }
}
