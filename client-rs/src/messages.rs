//! Wire types for the Chatter HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/postMessage`
#[derive(Debug, Clone, Serialize)]
pub struct PostMessageRequest<'a> {
    pub message: &'a str,
    pub user: &'a str,
}

/// Body of `POST /api/getNewMessages`
#[derive(Debug, Clone, Serialize)]
pub struct FetchRequest {
    pub time: DateTime<Utc>,
}

/// Response of `POST /api/getNewMessages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBatch {
    pub messages: Vec<Message>,
    /// Resume point for the next poll
    pub cursor: DateTime<Utc>,
}

/// Error body returned with every non-success status
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
