//! In-memory message log

use crate::messages::{Cursor, Message, NewMessage};
use crate::storage::{next_timestamp, MessageStore, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Source of "now" for append timestamps
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Default)]
struct Log {
    /// Messages in append order, which is also `created_at` order
    messages: Vec<Message>,
    /// id -> position in `messages`
    by_id: HashMap<Uuid, usize>,
}

/// Process-local append-only log.
///
/// Appends take the write lock, so they are serialized and readers never see
/// a half-written entry.
pub struct MemoryStore {
    log: RwLock<Log>,
    clock: Clock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    /// Use a custom clock (tests drive skew and stalls through this)
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            log: RwLock::new(Log::default()),
            clock,
        }
    }

    /// Index of the first message created after `cursor`
    fn position_after(messages: &[Message], cursor: Cursor) -> usize {
        let cursor = cursor.as_datetime();
        messages.partition_point(|m| m.created_at <= cursor)
    }

    pub fn len(&self) -> usize {
        self.log.read().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.read().messages.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: NewMessage) -> Result<Message, StorageError> {
        let mut log = self.log.write();

        let last = log.messages.last().map(|m| m.created_at);
        let stored = Message {
            id: Uuid::new_v4(),
            text: message.text,
            author: message.author,
            owner: message.owner,
            created_at: next_timestamp((self.clock)(), last),
        };

        let position = log.messages.len();
        log.by_id.insert(stored.id, position);
        log.messages.push(stored.clone());

        Ok(stored)
    }

    async fn since(&self, cursor: Cursor) -> Result<Vec<Message>, StorageError> {
        let log = self.log.read();
        let start = Self::position_after(&log.messages, cursor);
        Ok(log.messages[start..].to_vec())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Message>, StorageError> {
        let log = self.log.read();
        Ok(log.by_id.get(&id).map(|&i| log.messages[i].clone()))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Message>, StorageError> {
        let log = self.log.read();
        let start = log.messages.len().saturating_sub(limit);
        Ok(log.messages[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use parking_lot::Mutex;

    /// A clock the test moves by hand
    fn manual_clock(start: DateTime<Utc>) -> (Clock, Arc<Mutex<DateTime<Utc>>>) {
        let now = Arc::new(Mutex::new(start));
        let handle = now.clone();
        let clock: Clock = Arc::new(move || *now.lock());
        (clock, handle)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_append_and_query_scenario() {
        let (clock, _) = manual_clock(t0());
        let store = MemoryStore::with_clock(clock);

        let msg = store.append(NewMessage::new("hi", "abc")).await.unwrap();
        assert_eq!(msg.created_at, t0());

        let before = Cursor::new(t0() - Duration::microseconds(1));
        let after = Cursor::new(t0() + Duration::microseconds(1));

        let found = store.since(before).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "hi");
        assert_eq!(found[0].author, "abc");
        assert_eq!(found[0].created_at, t0());

        assert!(store.since(after).await.unwrap().is_empty());
        // Strictly greater: the message's own timestamp excludes it
        assert!(store.since(msg.cursor()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_returns_all_in_append_order() {
        let store = MemoryStore::new();
        let start = Cursor::now();

        for i in 0..50 {
            store.append(NewMessage::new(format!("m{}", i), "a")).await.unwrap();
        }

        let all = store.since(Cursor::beginning()).await.unwrap();
        assert_eq!(all.len(), 50);
        assert!(start <= all[0].cursor());
        for (i, msg) in all.iter().enumerate() {
            assert_eq!(msg.text, format!("m{}", i));
        }
        assert!(all.windows(2).all(|w| w[0].created_at < w[1].created_at));
    }

    #[tokio::test]
    async fn test_query_is_exact_subset_for_every_cursor() {
        let store = MemoryStore::new();
        for i in 0..20 {
            store.append(NewMessage::new(format!("m{}", i), "a")).await.unwrap();
        }
        let all = store.since(Cursor::beginning()).await.unwrap();

        for pivot in &all {
            let expected: Vec<_> = all
                .iter()
                .filter(|m| m.created_at > pivot.created_at)
                .cloned()
                .collect();
            assert_eq!(store.since(pivot.cursor()).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_stalled_clock_still_orders() {
        let (clock, _) = manual_clock(t0());
        let store = MemoryStore::with_clock(clock);

        let a = store.append(NewMessage::new("a", "x")).await.unwrap();
        let b = store.append(NewMessage::new("b", "x")).await.unwrap();

        assert!(b.created_at > a.created_at);
        assert_eq!(store.since(a.cursor()).await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn test_clock_regression_never_reorders() {
        let (clock, now) = manual_clock(t0());
        let store = MemoryStore::with_clock(clock);

        let first = store.append(NewMessage::new("first", "x")).await.unwrap();
        *now.lock() = t0() - Duration::seconds(30);
        let second = store.append(NewMessage::new("second", "x")).await.unwrap();

        assert!(second.created_at > first.created_at);
        let all = store.since(Cursor::beginning()).await.unwrap();
        assert_eq!(all, vec![first, second]);
    }

    #[tokio::test]
    async fn test_repeated_query_without_appends_is_empty() {
        let store = MemoryStore::new();
        let msg = store.append(NewMessage::new("hi", "abc")).await.unwrap();

        for _ in 0..5 {
            assert!(store.since(msg.cursor()).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_empty_text_accepted() {
        let store = MemoryStore::new();
        let msg = store.append(NewMessage::new("", "abc")).await.unwrap();
        assert_eq!(msg.text, "");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_and_recent() {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            let msg = store
                .append(NewMessage::new(format!("m{}", i), "a").owned_by("u-1"))
                .await
                .unwrap();
            ids.push(msg.id);
        }

        let third = store.get(ids[2]).await.unwrap().unwrap();
        assert_eq!(third.text, "m2");
        assert_eq!(third.owner.as_deref(), Some("u-1"));
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());

        let recent = store.recent(2).await.unwrap();
        assert_eq!(recent.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(), vec!["m3", "m4"]);
        assert_eq!(store.recent(100).await.unwrap().len(), 5);
        assert!(store.recent(0).await.unwrap().is_empty());
    }
}
