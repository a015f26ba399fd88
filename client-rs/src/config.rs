//! Configuration for the Chatter client

use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

/// Configuration for polling a Chatter server
#[derive(Debug, Clone)]
pub struct ChatterConfig {
    /// Server URL (e.g., "http://localhost:3000")
    pub url: String,

    /// Bearer token (sess-* or admin key); guest when unset
    pub token: Option<String>,

    /// Sender token attached to posted messages
    pub author: String,

    /// Interval between polls
    pub poll_interval: Duration,

    /// Timeout for each HTTP request
    pub request_timeout: Duration,

    /// Where polling starts; now when unset
    pub since: Option<DateTime<Utc>>,
}

impl ChatterConfig {
    /// Create a new configuration for the given server URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            author: random_author(),
            poll_interval: Duration::from_millis(1500),
            request_timeout: Duration::from_secs(10),
            since: None,
        }
    }

    /// Authenticate requests with a bearer token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Use a fixed author token instead of a random one
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Start polling from this instant (e.g. the Unix epoch for full history)
    pub fn since(mut self, cursor: DateTime<Utc>) -> Self {
        self.since = Some(cursor);
        self
    }
}

/// 16 hex characters of randomness
fn random_author() -> String {
    let mut rng = rand::rng();
    format!("{:016x}", rng.random::<u64>())
}
