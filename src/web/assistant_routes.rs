//! HTTP surface of the assistant orchestrator. Authentication is handled by
//! the surrounding middleware stack, which injects [`AuthenticatedUser`].

use crate::assistant::MAX_MESSAGE_BYTES;
use crate::models::assistant_turns::{AssistantTurn, TurnRole};
use crate::web::AuthenticatedUser;
use crate::{ApiError, AppState};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationMessage {
    pub id: i64,
    pub role: TurnRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<AssistantTurn> for ConversationMessage {
    fn from(turn: AssistantTurn) -> Self {
        ConversationMessage {
            id: turn.id,
            role: turn.role,
            content: turn.content,
            tokens_used: turn.tokens_used,
            model: turn.model,
            response_time_ms: turn.response_time_ms,
            created_at: turn.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageResponse {
    pub session_id: String,
    pub assistant_message: String,
    pub tokens_used: i32,
    pub model: String,
    pub response_time_ms: i32,
    pub conversation: Vec<ConversationMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEntry {
    pub session_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<DateTime<Utc>>,
    pub message_count: i64,
    pub formatted_time: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub conversation: Vec<ConversationMessage>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// POST /v1/assistant/messages - send one user message and wait for the reply
async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError::Validation("Message is required"));
    }
    if message.len() > MAX_MESSAGE_BYTES {
        return Err(ApiError::Validation("Message is too long"));
    }

    debug!("Chat message from user {}", user.user_id);

    let outcome = state
        .assistant
        .send_message(user.user_id, message, body.session_id)
        .await?;

    Ok(Json(SendMessageResponse {
        session_id: outcome.session_id,
        assistant_message: outcome.assistant_message,
        tokens_used: outcome.tokens_used,
        model: outcome.model,
        response_time_ms: outcome.response_time_ms,
        conversation: outcome
            .conversation
            .into_iter()
            .map(ConversationMessage::from)
            .collect(),
    }))
}

/// GET /v1/assistant/sessions - list the caller's sessions
async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = state.assistant.list_sessions(user.user_id)?;
    Ok(Json(SessionListResponse {
        sessions: sessions
            .into_iter()
            .map(|overview| SessionEntry {
                session_id: overview.session_id,
                title: overview.title,
                last_message_time: overview.last_message_time,
                message_count: overview.message_count,
                formatted_time: overview.formatted_time,
            })
            .collect(),
    }))
}

/// GET /v1/assistant/sessions/:session_id - conversation history
async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(params): Query<HistoryParams>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let turns = state
        .assistant
        .get_history(user.user_id, &session_id, params.limit)?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(HistoryResponse {
        session_id,
        conversation: turns.into_iter().map(ConversationMessage::from).collect(),
    }))
}

/// POST /v1/assistant/sessions/:session_id/title - derive a session title
///
/// Always returns 200: titling is best-effort and a failure here must never
/// break the client's navigation flow.
async fn generate_title(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Json<StatusResponse> {
    if let Err(e) = state
        .assistant
        .generate_title(user.user_id, &session_id)
        .await
    {
        error!(
            "Title generation failed for user {} session {}: {}",
            user.user_id, session_id, e
        );
    }
    Json(StatusResponse { status: "ok" })
}

/// DELETE /v1/assistant/sessions/:session_id - soft-delete a session
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<StatusResponse>, ApiError> {
    let deleted = state.assistant.delete_session(user.user_id, &session_id)?;
    if !deleted {
        return Err(ApiError::NotFound);
    }
    Ok(Json(StatusResponse { status: "ok" }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/assistant/messages", post(send_message))
        .route("/v1/assistant/sessions", get(list_sessions))
        .route(
            "/v1/assistant/sessions/:session_id",
            get(get_history).delete(delete_session),
        )
        .route(
            "/v1/assistant/sessions/:session_id/title",
            post(generate_title),
        )
        .with_state(state)
}
