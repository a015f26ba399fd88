//! Request transport for the polling client

use crate::config::ChatterConfig;
use crate::error::{ChatterError, Result};
use crate::messages::{ErrorBody, FetchRequest, Message, MessageBatch, PostMessageRequest};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// The two requests the poll cycle needs
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post a message; returns the stored message
    async fn post_message(&self, text: &str, author: &str) -> Result<Message>;

    /// Fetch every message created after `since`
    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<MessageBatch>;
}

/// JSON over HTTP via reqwest
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ChatterConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Request complete");

        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.to_string(),
        };
        Err(ChatterError::from_status(status.as_u16(), message))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn post_message(&self, text: &str, author: &str) -> Result<Message> {
        self.post_json(
            "/api/postMessage",
            &PostMessageRequest {
                message: text,
                user: author,
            },
        )
        .await
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<MessageBatch> {
        self.post_json("/api/getNewMessages", &FetchRequest { time: since })
            .await
    }
}
