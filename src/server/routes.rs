//! HTTP routes for the chat API

use crate::auth::{Action, Authenticator, Caller, TokenError};
use crate::chats::{ChatError, ChatService, FetchMessages, MessageBatch, PostMessage};
use crate::messages::Message;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

/// Shared state for request handlers
#[derive(Clone)]
pub struct AppState {
    pub chats: Arc<ChatService>,
    pub authenticator: Arc<Authenticator>,
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/postMessage", post(post_message_handler))
        .route("/api/getNewMessages", post(get_new_messages_handler))
        .route("/api/chats", get(list_handler))
        .route("/api/chats/{chat_id}", get(read_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ChatError::Forbidden => StatusCode::FORBIDDEN,
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Evaluation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::Storage(e) => {
                error!(error = %e, "Storage failure");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };

        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// The caller behind a request, from its `Authorization: Bearer` header
pub struct RequestCaller(pub Caller);

impl FromRequestParts<AppState> for RequestCaller {
    type Rejection = ChatError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let bearer = match parts.headers.get(AUTHORIZATION) {
            None => None,
            Some(value) => {
                let value = value.to_str().map_err(|_| TokenError::InvalidFormat)?;
                let token = value
                    .strip_prefix("Bearer ")
                    .ok_or(TokenError::InvalidFormat)?
                    .trim();
                Some(token)
            }
        };

        let caller = state.authenticator.caller(bearer).map_err(|e| {
            warn!(error = %e, "Rejected credentials");
            ChatError::Unauthenticated(e)
        })?;
        Ok(RequestCaller(caller))
    }
}

/// Unwrap a JSON body, reporting a malformed one only to callers allowed to
/// perform `action` at all
fn json_body<T>(
    chats: &ChatService,
    caller: &Caller,
    action: Action,
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, ChatError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            chats.authorize_collection(caller, action)?;
            Err(ChatError::Validation(rejection.body_text()))
        }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn post_message_handler(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    body: Result<Json<PostMessage>, JsonRejection>,
) -> Result<Json<Message>, ChatError> {
    let request = json_body(&state.chats, &caller, Action::Post, body)?;
    let message = state.chats.post_message(&caller, request).await?;
    Ok(Json(message))
}

async fn get_new_messages_handler(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    body: Result<Json<FetchMessages>, JsonRejection>,
) -> Result<Json<MessageBatch>, ChatError> {
    let request = json_body(&state.chats, &caller, Action::Get, body)?;
    let batch = state.chats.fetch_new(&caller, request).await?;
    Ok(Json(batch))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

async fn list_handler(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Message>>, ChatError> {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => {
            state.chats.authorize_collection(&caller, Action::Get)?;
            return Err(ChatError::Validation(rejection.body_text()));
        }
    };

    let messages = state.chats.list(&caller, params.limit).await?;
    Ok(Json(messages))
}

async fn read_handler(
    State(state): State<AppState>,
    RequestCaller(caller): RequestCaller,
    Path(chat_id): Path<String>,
) -> Result<Json<Message>, ChatError> {
    let message = state.chats.get(&caller, &chat_id).await?;
    Ok(Json(message))
}
