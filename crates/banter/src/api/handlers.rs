//! Request handlers.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};

use crate::relay::ChatEvent;
use crate::session::{Message, SessionSummary};

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Generic success response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    fn success() -> Json<Self> {
        Json(Self { status: "success" })
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: String,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        backend: state.settings.llm.backend.clone(),
    })
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.store.list().await)
}

/// Request body for session creation.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Response for session creation.
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub id: String,
}

/// POST /api/sessions — creates and activates a session.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<Json<CreateSessionResponse>> {
    let system_prompt = request
        .system_prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| state.settings.chat.system_prompt.clone());

    let session = state.store.create(system_prompt).await?;
    state.set_active_session(Some(session.id.clone())).await;
    Ok(Json(CreateSessionResponse { id: session.id }))
}

/// POST /api/sessions/{session_id}/activate
pub async fn activate_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    // Loading both validates the id and refreshes last_active.
    state.store.load(&session_id).await?;
    state.set_active_session(Some(session_id)).await;
    Ok(StatusResponse::success())
}

/// DELETE /api/sessions/{session_id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    state.store.delete(&session_id).await?;
    state.clear_active_if(&session_id).await;
    Ok(StatusResponse::success())
}

/// Request body for session rename.
#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub name: String,
}

/// PUT /api/sessions/{session_id}/name
pub async fn rename_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<RenameSessionRequest>,
) -> ApiResult<Json<StatusResponse>> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("empty name"));
    }
    state.store.rename(&session_id, name).await?;
    Ok(StatusResponse::success())
}

/// GET /api/history — messages of the active session, or `[]`.
pub async fn get_history(State(state): State<AppState>) -> ApiResult<Json<Vec<Message>>> {
    match state.active_session_id().await {
        Some(id) => Ok(Json(state.store.load(&id).await?.messages)),
        None => Ok(Json(Vec::new())),
    }
}

/// Request body for both chat endpoints.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// POST /api/chat — non-streaming chat turn.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<StatusResponse>> {
    let text = request.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::bad_request("empty message"));
    }
    let session_id = require_active(&state).await?;

    state.relay.chat(&session_id, &text).await?;
    Ok(StatusResponse::success())
}

/// POST /api/chat/stream — streamed chat turn as server-sent events.
///
/// Frames are `{"chunk": ...}` repeated, terminated by `{"done": true}`
/// or `{"error": ...}`.
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let text = request.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::bad_request("empty message"));
    }
    let session_id = require_active(&state).await?;

    let events = state.relay.chat_stream(&session_id, &text).await?;
    let stream = ReceiverStream::new(events).map(|event| {
        let payload = match event {
            ChatEvent::Chunk(chunk) => json!({"chunk": chunk}),
            ChatEvent::Done => json!({"done": true}),
            ChatEvent::Error(error) => json!({"error": error}),
        };
        Ok(Event::default().data(payload.to_string()))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Request body for message update.
#[derive(Debug, Deserialize)]
pub struct UpdateMessageRequest {
    pub content: String,
}

/// PUT /api/history/messages/{index}
pub async fn update_message(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(request): Json<UpdateMessageRequest>,
) -> ApiResult<Json<StatusResponse>> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(ApiError::bad_request("empty content"));
    }
    let session_id = require_active(&state).await?;

    state.store.update_message(&session_id, index, content).await?;
    Ok(StatusResponse::success())
}

/// Request body for tail deletion.
#[derive(Debug, Deserialize)]
pub struct DeleteMessagesRequest {
    #[serde(default = "default_delete_count")]
    pub count: usize,
}

fn default_delete_count() -> usize {
    1
}

/// Response for tail deletion.
#[derive(Debug, Serialize)]
pub struct DeleteMessagesResponse {
    pub status: &'static str,
    pub deleted: usize,
}

/// DELETE /api/history/messages
pub async fn delete_messages(
    State(state): State<AppState>,
    Json(request): Json<DeleteMessagesRequest>,
) -> ApiResult<Json<DeleteMessagesResponse>> {
    let session_id = require_active(&state).await?;
    let deleted = state
        .store
        .delete_last_messages(&session_id, request.count)
        .await?;
    Ok(Json(DeleteMessagesResponse {
        status: "success",
        deleted,
    }))
}

/// POST /api/reset — clears the active session's messages.
pub async fn reset(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let session_id = require_active(&state).await?;
    state.store.clear(&session_id).await?;
    Ok(StatusResponse::success())
}

async fn require_active(state: &AppState) -> ApiResult<String> {
    state
        .active_session_id()
        .await
        .ok_or_else(|| ApiError::bad_request("no active session"))
}
