use axum::{
    extract::{ Path, Request, State },
    http::{ HeaderMap, StatusCode },
    middleware::{ self, Next },
    response::{ IntoResponse, Response },
    routing::{ delete, get, post },
    Json,
    Router,
};
use log::{ error, info, warn };
use serde::{ Deserialize, Serialize };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{ Any, CorsLayer };

use super::api_key_matches;
use crate::config::knowledge::{ knowledge_content, KnowledgeContent };
use crate::config::welcome::{ welcome_content, WelcomeContent };
use crate::conversation::{ ConversationError, ConversationStore };
use crate::llm::chat::{ CompletionResponse, LlmMessage };
use crate::llm::LlmError;
use crate::models::chat::MessageId;
use crate::render::{ render_all, RenderedMessage, SectionColorPolicy };

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConversationStore>,
    pub policy: Arc<SectionColorPolicy>,
    pub api_key: Option<Arc<str>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponseRequest {
    pub messages: Option<Vec<LlmMessage>>,
    pub user_input: Option<String>,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCreated {
    pub conversation_id: String,
}

#[derive(Serialize)]
pub struct CopyResponse {
    pub text: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Conversation {0} not found")]
    UnknownConversation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Conversation(#[from] ConversationError),
    #[error("Failed to process request")]
    Upstream(#[from] LlmError),
    #[error("Unauthorized")]
    Unauthorized,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::UnknownConversation(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conversation(ConversationError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Conversation(ConversationError::NotCopyable(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conversation(ConversationError::Busy) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        };
        let details = match &self {
            ApiError::Upstream(e) => Some(e.to_string()),
            _ => None,
        };
        let body = ErrorBody { error: self.to_string(), details };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/chat-response", post(chat_response_handler))
        .route("/api/conversations", post(create_conversation_handler))
        .route("/api/conversations/{id}", delete(clear_conversation_handler))
        .route(
            "/api/conversations/{id}/messages",
            get(list_messages_handler).post(send_message_handler)
        )
        .route("/api/conversations/{id}/messages/{message_id}/copy", get(copy_message_handler))
        .route("/api/welcome", get(welcome_handler))
        .route("/api/knowledge", get(knowledge_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    http_port: u16,
    state: AppState
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
        e
    })?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!("HTTP server started");
    Ok(())
}

async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next
) -> Result<Response, ApiError> {
    let header = header_value(req.headers(), "x-api-key");
    if api_key_matches(state.api_key.as_deref(), header, req.uri().query()) {
        Ok(next.run(req).await)
    } else {
        warn!("Rejected HTTP request to {} without a valid API key", req.uri().path());
        Err(ApiError::Unauthorized)
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Thin proxy to the completion backend: forwards `messages` as-is, or wraps
/// `userInput` with the configured system prompt.
async fn chat_response_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatResponseRequest>
) -> Result<Json<CompletionResponse>, ApiError> {
    let messages = match (req.messages, req.user_input) {
        (Some(messages), _) if !messages.is_empty() => messages,
        (_, Some(input)) if !input.trim().is_empty() =>
            vec![
                LlmMessage::system(state.store.config().system_prompt.as_ref()),
                LlmMessage::user(input)
            ],
        _ => {
            return Err(ApiError::BadRequest("Either messages or userInput is required".into()));
        }
    };

    let timeout = state.store.config().request_timeout;
    let completion = tokio::time::timeout(timeout, state.store.client().complete(&messages)).await
        .map_err(|_| LlmError::Timeout(timeout))
        .and_then(|r| r)
        .map_err(|e| {
            error!("Error with completion backend: {}", e);
            e
        })?;

    Ok(Json(completion))
}

async fn create_conversation_handler(
    State(state): State<AppState>
) -> (StatusCode, Json<ConversationCreated>) {
    let conversation = state.store.create();
    info!("Created conversation {}", conversation.id());
    (
        StatusCode::CREATED,
        Json(ConversationCreated {
            conversation_id: conversation.id().to_string(),
        }),
    )
}

async fn list_messages_handler(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<Json<Vec<RenderedMessage>>, ApiError> {
    let conversation = state.store.get(&id).ok_or(ApiError::UnknownConversation(id))?;
    Ok(Json(render_all(&conversation.current_messages(), &state.policy)))
}

async fn send_message_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>
) -> Result<Json<Vec<RenderedMessage>>, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("Message content is empty".into()));
    }
    let conversation = state.store.get(&id).ok_or(ApiError::UnknownConversation(id))?;

    let seen = conversation
        .current_messages()
        .last()
        .map(|m| m.id);
    // Runs detached so a client disconnect does not cut the cycle short.
    let cycle = {
        let conversation = conversation.clone();
        tokio::spawn(async move { conversation.send_user_message(&req.content).await })
    };
    if let Err(e) = cycle.await {
        error!("Conversation {}: send task failed: {}", conversation.id(), e);
    }

    let fresh: Vec<_> = conversation
        .current_messages()
        .into_iter()
        .filter(|m| Some(m.id) > seen)
        .collect();
    Ok(Json(render_all(&fresh, &state.policy)))
}

async fn copy_message_handler(
    State(state): State<AppState>,
    Path((id, message_id)): Path<(String, u64)>
) -> Result<Json<CopyResponse>, ApiError> {
    let conversation = state.store.get(&id).ok_or(ApiError::UnknownConversation(id))?;
    let text = conversation.copy_assistant_message(MessageId(message_id))?;
    Ok(Json(CopyResponse { text }))
}

async fn clear_conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<StatusCode, ApiError> {
    let conversation = state.store.get(&id).ok_or_else(|| ApiError::UnknownConversation(id.clone()))?;
    conversation.clear()?;
    state.store.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

async fn welcome_handler() -> Json<WelcomeContent> {
    Json(welcome_content())
}

async fn knowledge_handler() -> Json<KnowledgeContent> {
    Json(knowledge_content())
}
