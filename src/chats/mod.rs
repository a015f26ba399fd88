//! Chat operations: authorization composed with the message log
//!
//! Every operation names the resource it touches and the verb it performs.
//! Single-message reads resolve the message first, so its owner can bypass
//! the role rules; collection operations go straight to the rules.

use crate::auth::{authorize, Access, AccessEvaluator, Action, Caller, EvaluationError, Owned, TokenError};
use crate::messages::{Cursor, Message, NewMessage};
use crate::resources::{ResourceError, ResourcePath};
use crate::storage::{MessageStore, StorageError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Collection resource guarded by the access policy
pub const CHATS_RESOURCE: &str = "/api/chats";

/// Default and maximum page size for history listing
pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 1000;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid credentials: {0}")]
    Unauthenticated(#[from] TokenError),

    #[error("User is not authorized")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("Unexpected authorization error")]
    Evaluation(#[from] EvaluationError),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

/// Body of a post-message request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostMessage {
    pub message: Option<String>,
    pub user: Option<String>,
}

/// Body of a fetch-new-messages request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchMessages {
    pub time: Option<Cursor>,
}

/// Messages newer than the request cursor, plus where to resume from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBatch {
    pub messages: Vec<Message>,
    /// `created_at` of the last message, or the request cursor if there were none
    pub cursor: Cursor,
}

/// The chat operations, shared by all request handlers
pub struct ChatService {
    store: Arc<dyn MessageStore>,
    evaluator: Arc<dyn AccessEvaluator>,
    collection: ResourcePath,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        evaluator: Arc<dyn AccessEvaluator>,
    ) -> Result<Self, ResourceError> {
        Ok(Self {
            store,
            evaluator,
            collection: ResourcePath::parse(CHATS_RESOURCE)?,
        })
    }

    fn require(
        &self,
        caller: &Caller,
        resource: &ResourcePath,
        action: Action,
        entity: Option<&dyn Owned>,
    ) -> Result<Access, ChatError> {
        let access = authorize(self.evaluator.as_ref(), caller, resource, action, entity).map_err(|e| {
            error!(resource = %resource, action = %action, error = %e, "Authorization check failed");
            ChatError::Evaluation(e)
        })?;

        if !access.is_allowed() {
            debug!(
                resource = %resource,
                action = %action,
                roles = %caller.roles(),
                "Access denied"
            );
            return Err(ChatError::Forbidden);
        }
        Ok(access)
    }

    /// Check `action` on the chat collection without touching the log
    pub fn authorize_collection(&self, caller: &Caller, action: Action) -> Result<Access, ChatError> {
        self.require(caller, &self.collection, action, None)
    }

    /// Append a message on behalf of the caller
    pub async fn post_message(&self, caller: &Caller, request: PostMessage) -> Result<Message, ChatError> {
        self.authorize_collection(caller, Action::Post)?;

        let text = request
            .message
            .ok_or_else(|| ChatError::Validation("message is required".to_string()))?;
        let author = request
            .user
            .ok_or_else(|| ChatError::Validation("user is required".to_string()))?;

        let mut new_message = NewMessage::new(text.trim(), author);
        if let Some(identity) = caller.identity() {
            new_message = new_message.owned_by(identity);
        }

        let stored = self.store.append(new_message).await?;
        info!(id = %stored.id, author = %stored.author, "Message posted");
        Ok(stored)
    }

    /// Messages created after the request cursor
    pub async fn fetch_new(&self, caller: &Caller, request: FetchMessages) -> Result<MessageBatch, ChatError> {
        self.authorize_collection(caller, Action::Get)?;

        let since = request
            .time
            .ok_or_else(|| ChatError::Validation("time is required".to_string()))?;

        let messages = self.store.since(since).await?;
        let cursor = messages.last().map(Message::cursor).unwrap_or(since);

        debug!(since = %since, count = messages.len(), "Fetched new messages");
        Ok(MessageBatch { messages, cursor })
    }

    /// Recent history, oldest first
    pub async fn list(&self, caller: &Caller, limit: Option<usize>) -> Result<Vec<Message>, ChatError> {
        self.authorize_collection(caller, Action::Get)?;

        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
        Ok(self.store.recent(limit).await?)
    }

    /// A single message. Its owner is always allowed to read it.
    pub async fn get(&self, caller: &Caller, id: &str) -> Result<Message, ChatError> {
        let id = Uuid::parse_str(id).map_err(|_| ChatError::Validation("Chat is invalid".to_string()))?;
        let resource = self
            .collection
            .child(&id.to_string())
            .map_err(|e| ChatError::Validation(e.to_string()))?;

        let message = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ChatError::NotFound("No Chat with that identifier has been found".to_string()))?;

        let access = self.require(caller, &resource, Action::Get, Some(&message))?;
        debug!(id = %id, access = %access, "Message read");
        Ok(message)
    }
}
