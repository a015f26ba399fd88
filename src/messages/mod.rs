//! Chat messages and poll cursors

use crate::auth::Owned;
use chrono::{DateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// A stored chat message. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    /// Opaque sender token chosen by the client
    pub author: String,
    /// Identity of the authenticated caller that posted it, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Assigned by the store at append time
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Cursor positioned at this message
    pub fn cursor(&self) -> Cursor {
        Cursor(self.created_at)
    }
}

impl Owned for Message {
    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}

/// A message before the store has assigned its id and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub text: String,
    pub author: String,
    pub owner: Option<String>,
}

impl NewMessage {
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
            owner: None,
        }
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Poll position: "give me everything created after this instant".
///
/// Serialized as RFC 3339 with microseconds. Deserializes from RFC 3339 or
/// from integer milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor(DateTime<Utc>);

impl Cursor {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    pub fn now() -> Self {
        Self(Utc::now().trunc_subsecs(6))
    }

    /// The Unix epoch; `since(beginning)` returns everything
    pub fn beginning() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn from_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Cursor {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Millis(millis) => Cursor::from_millis(millis)
                .ok_or_else(|| serde::de::Error::custom("timestamp out of range")),
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| Cursor(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}
