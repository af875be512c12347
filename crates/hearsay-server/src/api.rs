use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use hearsay_shared::constants::MAX_MESSAGE_LEN;
use hearsay_shared::types::{ChatHistory, ChatId, ChatSummary, Message, MessageId, UserId};
use hearsay_store::{ChatRecord, Database};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::hub::Hub;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub hub: Hub,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/ws", get(ws::ws_handler))
        .route("/chats", get(list_chats).post(create_chat))
        .route("/chats/:id", get(fetch_chat))
        .route("/messages/:chat_id", post(post_message))
        .route("/messages/soft-delete", put(soft_delete_messages))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateChatRequest {
    receiver_id: UserId,
}

#[derive(Deserialize)]
struct PostMessageRequest {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SoftDeleteRequest {
    chat_id: ChatId,
    message_ids: Vec<MessageId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SoftDeleteResponse {
    new_last_message: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Resolve the caller's identity from the `x-user-id` header.
///
/// Authentication proper is out of scope; an upstream proxy is expected to
/// have validated the identity before it reaches us.
fn caller(headers: &HeaderMap) -> Result<UserId, ServerError> {
    let raw = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::Unauthorized)?;

    let id = Uuid::parse_str(raw.trim()).map_err(|_| ServerError::Unauthorized)?;
    Ok(UserId(id))
}

/// Project a chat record into the viewer-specific summary shape.
fn summarize(db: &Database, chat: ChatRecord, viewer: &UserId) -> ChatSummary {
    let receiver = chat
        .counterpart_of(viewer)
        .and_then(|other| db.get_user(other).ok())
        .map(|record| record.profile());

    ChatSummary {
        id: chat.id,
        participants: chat.participants,
        receiver,
        last_message: chat.last_message,
        seen_by: chat.seen_by,
        unread_count: 0,
    }
}

async fn list_chats(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<ChatSummary>>, ServerError> {
    let caller = caller(&headers)?;

    let db = state.db.lock().await;
    let records = db.list_chats_for_user(&caller)?;
    let summaries = records
        .into_iter()
        .map(|chat| summarize(&db, chat, &caller))
        .collect();

    Ok(Json(summaries))
}

async fn create_chat(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<CreateChatRequest>,
) -> Result<Json<ChatSummary>, ServerError> {
    let caller = caller(&headers)?;

    // Build both perspectives while the lock is held, push after.
    let (mine, theirs) = {
        let db = state.db.lock().await;
        let chat = db.create_chat(&caller, &req.receiver_id)?;
        (
            summarize(&db, chat.clone(), &caller),
            summarize(&db, chat, &req.receiver_id),
        )
    };

    info!(chat = %mine.id, "chat created");
    state.hub.notify_new_chat(&req.receiver_id, theirs).await;

    Ok(Json(mine))
}

async fn fetch_chat(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatHistory>, ServerError> {
    let caller = caller(&headers)?;

    let db = state.db.lock().await;
    let history = db.fetch_chat(&ChatId(id), &caller)?;
    Ok(Json(history))
}

async fn post_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> Result<Json<Message>, ServerError> {
    let caller = caller(&headers)?;

    if req.text.is_empty() {
        return Err(ServerError::BadRequest(
            "Message text must not be empty".to_string(),
        ));
    }
    if req.text.len() > MAX_MESSAGE_LEN {
        return Err(ServerError::BadRequest(format!(
            "Message text exceeds {} bytes",
            MAX_MESSAGE_LEN
        )));
    }

    let mut db = state.db.lock().await;
    let message = db.append_message(&ChatId(chat_id), &caller, &req.text)?;
    Ok(Json(message))
}

async fn soft_delete_messages(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<SoftDeleteRequest>,
) -> Result<Json<SoftDeleteResponse>, ServerError> {
    let caller = caller(&headers)?;

    if req.message_ids.is_empty() {
        return Err(ServerError::BadRequest(
            "Message ids must not be empty".to_string(),
        ));
    }

    let mut db = state.db.lock().await;
    let new_last_message = db.soft_delete_messages(&req.chat_id, &caller, &req.message_ids)?;

    Ok(Json(SoftDeleteResponse { new_last_message }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
