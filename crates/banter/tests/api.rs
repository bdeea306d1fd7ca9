//! Router-level integration tests with a scripted backend.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use banter::api::{AppState, create_router};
use banter::backend::{BackendResult, ChatBackend, FragmentReceiver};
use banter::relay::Relay;
use banter::session::{Message, SessionStore};
use banter::settings::Settings;

/// Backend that streams two fragments and completes with their join.
struct ScriptedBackend;

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, _: &str, _: &[Message], _: &str) -> BackendResult<String> {
        Ok("Hello!".to_string())
    }

    async fn stream(&self, _: &str, _: &[Message], _: &str) -> BackendResult<FragmentReceiver> {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for fragment in ["Hel", "lo!"] {
                if tx.send(Ok(fragment.to_string())).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn simple_complete(&self, _: &str) -> BackendResult<String> {
        Ok("Friendly Greeting Chat".to_string())
    }
}

async fn test_app() -> (Router, TempDir) {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SessionStore::open(temp.path(), 100).await.unwrap());
    let backend: Arc<dyn ChatBackend> = Arc::new(ScriptedBackend);
    let relay = Relay::new(store.clone(), backend, None, true);
    let state = AppState::new(store, relay, Arc::new(Settings::default()));
    (create_router(state), temp)
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, String) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(value) => builder.body(Body::from(value.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send_json(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, text) = send(router, method, uri, body).await;
    let value = serde_json::from_str(&text).unwrap_or(Value::Null);
    (status, value)
}

/// Extract `chunk` payloads and the terminal frame from an SSE body.
fn parse_sse(body: &str) -> (Vec<String>, Vec<Value>) {
    let mut chunks = Vec::new();
    let mut frames = Vec::new();
    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data: ") {
            let value: Value = serde_json::from_str(data).unwrap();
            if let Some(chunk) = value.get("chunk").and_then(Value::as_str) {
                chunks.push(chunk.to_string());
            }
            frames.push(value);
        }
    }
    (chunks, frames)
}

#[tokio::test]
async fn test_health() {
    let (router, _tmp) = test_app().await;
    let (status, body) = send_json(&router, "GET", "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["backend"], json!("compat"));
}

#[tokio::test]
async fn test_end_to_end_streamed_chat() {
    let (router, _tmp) = test_app().await;

    let (status, created) = send_json(&router, "POST", "/api/sessions", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(created["id"].as_str().is_some());

    let (status, body) = send(
        &router,
        "POST",
        "/api/chat/stream",
        Some(json!({"text": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (chunks, frames) = parse_sse(&body);
    let full: String = chunks.concat();
    assert!(!full.is_empty());
    assert_eq!(full, "Hello!");
    assert_eq!(frames.last().unwrap()["done"], json!(true));

    let (status, history) = send_json(&router, "GET", "/api/history", None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = history.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], json!("user"));
    assert_eq!(messages[0]["content"], json!("hello"));
    assert_eq!(messages[1]["role"], json!("assistant"));
    assert_eq!(messages[1]["content"], json!("Hello!"));
}

#[tokio::test]
async fn test_non_streaming_chat() {
    let (router, _tmp) = test_app().await;
    send_json(&router, "POST", "/api/sessions", Some(json!({}))).await;

    let (status, body) =
        send_json(&router, "POST", "/api/chat", Some(json!({"text": "hello"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("success"));

    let (_, history) = send_json(&router, "GET", "/api/history", None).await;
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let (router, _tmp) = test_app().await;
    send_json(&router, "POST", "/api/sessions", Some(json!({}))).await;

    let (status, body) =
        send_json(&router, "POST", "/api/chat", Some(json!({"text": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("BAD_REQUEST"));

    let (status, _) = send_json(
        &router,
        "POST",
        "/api/chat/stream",
        Some(json!({"text": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_without_active_session() {
    let (router, _tmp) = test_app().await;

    let (status, body) =
        send_json(&router, "POST", "/api/chat", Some(json!({"text": "hello"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("no active session")
    );
}

#[tokio::test]
async fn test_history_empty_without_active_session() {
    let (router, _tmp) = test_app().await;
    let (status, history) = send_json(&router, "GET", "/api/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn test_activate_unknown_session() {
    let (router, _tmp) = test_app().await;
    let (status, body) =
        send_json(&router, "POST", "/api/sessions/nope/activate", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("NOT_FOUND"));
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (router, _tmp) = test_app().await;

    let (_, created) = send_json(&router, "POST", "/api/sessions", Some(json!({}))).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Rename rejects empty, accepts real names.
    let (status, _) = send_json(
        &router,
        "PUT",
        &format!("/api/sessions/{id}/name"),
        Some(json!({"name": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &router,
        "PUT",
        &format!("/api/sessions/{id}/name"),
        Some(json!({"name": "Foo Bar"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = send_json(&router, "GET", "/api/sessions", None).await;
    let sessions = listed.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["name"], json!("Foo Bar"));
    assert_eq!(sessions[0]["id"], json!(id.as_str()));

    // Deleting the active session clears it.
    let (status, _) = send_json(&router, "DELETE", &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, history) = send_json(&router, "GET", "/api/history", None).await;
    assert_eq!(history, json!([]));

    let (status, _) = send_json(&router, "DELETE", &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_message_editing_and_reset() {
    let (router, _tmp) = test_app().await;
    send_json(&router, "POST", "/api/sessions", Some(json!({}))).await;
    send_json(&router, "POST", "/api/chat", Some(json!({"text": "hello"}))).await;

    let (status, _) = send_json(
        &router,
        "PUT",
        "/api/history/messages/0",
        Some(json!({"content": "edited"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &router,
        "PUT",
        "/api/history/messages/9",
        Some(json!({"content": "edited"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, history) = send_json(&router, "GET", "/api/history", None).await;
    assert_eq!(history[0]["content"], json!("edited"));

    let (status, body) = send_json(
        &router,
        "DELETE",
        "/api/history/messages",
        Some(json!({"count": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], json!(2));

    send_json(&router, "POST", "/api/chat", Some(json!({"text": "again"}))).await;
    let (status, body) = send_json(&router, "POST", "/api/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("success"));

    let (_, history) = send_json(&router, "GET", "/api/history", None).await;
    assert_eq!(history, json!([]));
}

/// Streaming fallback at the HTTP boundary: a backend whose stream call
/// fails still yields exactly one chunk equal to the non-streaming reply.
struct NoStreamBackend;

#[async_trait]
impl ChatBackend for NoStreamBackend {
    async fn complete(&self, _: &str, _: &[Message], _: &str) -> BackendResult<String> {
        Ok("fallback reply".to_string())
    }

    async fn stream(&self, _: &str, _: &[Message], _: &str) -> BackendResult<FragmentReceiver> {
        Err(banter::backend::BackendError::transport(
            "connection refused",
        ))
    }

    async fn simple_complete(&self, _: &str) -> BackendResult<String> {
        Ok("unused".to_string())
    }
}

#[tokio::test]
async fn test_stream_endpoint_falls_back_to_complete() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SessionStore::open(temp.path(), 100).await.unwrap());
    let backend: Arc<dyn ChatBackend> = Arc::new(NoStreamBackend);
    let relay = Relay::new(store.clone(), backend, None, true);
    let state = AppState::new(store, relay, Arc::new(Settings::default()));
    let router = create_router(state);

    send_json(&router, "POST", "/api/sessions", Some(json!({}))).await;
    let (status, body) = send(
        &router,
        "POST",
        "/api/chat/stream",
        Some(json!({"text": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (chunks, frames) = parse_sse(&body);
    assert_eq!(chunks, vec!["fallback reply".to_string()]);
    assert_eq!(frames.last().unwrap()["done"], json!(true));
}
