//! Chatter polling client implementation

use crate::config::ChatterConfig;
use crate::error::Result;
use crate::messages::{Message, MessageBatch};
use crate::transport::{ChatTransport, HttpTransport};
use crate::view::MessageView;

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Where the client is in its poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Ready to issue the next poll
    Idle,
    /// A fetch request is in flight
    AwaitingResponse,
    /// Polling has been stopped
    Stopped,
}

/// Handler for newly received messages
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Internal client state
struct ClientInner {
    config: ChatterConfig,
    transport: Arc<dyn ChatTransport>,
    state: watch::Sender<PollState>,
    view: Mutex<MessageView>,
    cursor: Mutex<DateTime<Utc>>,
    handlers: Mutex<Vec<MessageHandler>>,

    // Poll loop task and its shutdown signal
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Chatter polling client
///
/// Polls the server on a fixed interval, merging each batch into a local view.
/// This struct is cheaply cloneable as it uses an internal Arc.
#[derive(Clone)]
pub struct ChatterClient {
    inner: Arc<ClientInner>,
}

impl ChatterClient {
    /// Create a client that talks HTTP to `config.url`
    pub fn new(config: ChatterConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over any transport
    pub fn with_transport(config: ChatterConfig, transport: Arc<dyn ChatTransport>) -> Self {
        let cursor = config
            .since
            .unwrap_or_else(|| Utc::now().trunc_subsecs(6));
        let (state, _) = watch::channel(PollState::Idle);

        let inner = Arc::new(ClientInner {
            config,
            transport,
            state,
            view: Mutex::new(MessageView::new()),
            cursor: Mutex::new(cursor),
            handlers: Mutex::new(Vec::new()),
            shutdown: Mutex::new(None),
            task: Mutex::new(None),
        });

        Self { inner }
    }

    /// The author token attached to posted messages
    pub fn author(&self) -> &str {
        &self.inner.config.author
    }

    /// Get the current poll state
    pub fn poll_state(&self) -> PollState {
        *self.inner.state.borrow()
    }

    /// Get a receiver for poll state changes
    pub fn state_receiver(&self) -> watch::Receiver<PollState> {
        self.inner.state.subscribe()
    }

    /// Messages received so far, oldest first
    pub fn messages(&self) -> Vec<Message> {
        self.inner.view.lock().messages().to_vec()
    }

    /// Resume point of the next poll
    pub fn cursor(&self) -> DateTime<Utc> {
        *self.inner.cursor.lock()
    }

    /// Register a handler called once for every newly received message
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.inner.handlers.lock().push(Arc::new(handler));
    }

    /// Start the poll loop. Does nothing if it is already running.
    pub fn start(&self) {
        let mut task = self.inner.task.lock();
        if task.is_some() {
            return;
        }

        // A manual poll may already be in flight; only clear Stopped
        self.inner.state.send_if_modified(|state| {
            if *state == PollState::Stopped {
                *state = PollState::Idle;
                true
            } else {
                false
            }
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.inner.shutdown.lock() = Some(shutdown_tx);
        *task = Some(tokio::spawn(poll_loop(self.inner.clone(), shutdown_rx)));

        info!(
            url = %self.inner.config.url,
            interval_ms = self.inner.config.poll_interval.as_millis() as u64,
            "Polling started"
        );
    }

    /// Stop the poll loop. A poll already in flight completes first.
    pub async fn stop(&self) {
        if let Some(shutdown) = self.inner.shutdown.lock().take() {
            let _ = shutdown.send(());
        }

        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Poll loop ended abnormally");
            }
        }

        self.inner.state.send_replace(PollState::Stopped);
        info!("Polling stopped");
    }

    /// Post a message, then poll right away so it shows up locally
    pub async fn send(&self, text: &str) -> Result<Message> {
        let message = self
            .inner
            .transport
            .post_message(text, &self.inner.config.author)
            .await?;
        debug!(id = %message.id, "Message sent");

        self.inner.poll_once().await;
        Ok(message)
    }

    /// Poll once outside the regular cycle.
    ///
    /// Returns `false` without sending anything if a poll is already in
    /// flight or polling has been stopped.
    pub async fn poll_now(&self) -> bool {
        self.inner.poll_once().await
    }
}

impl ClientInner {
    async fn poll_once(&self) -> bool {
        let started = self.state.send_if_modified(|state| {
            if *state == PollState::Idle {
                *state = PollState::AwaitingResponse;
                true
            } else {
                false
            }
        });
        if !started {
            return false;
        }

        let since = *self.cursor.lock();
        match self.transport.fetch_since(since).await {
            Ok(batch) => self.apply(batch),
            Err(e) => warn!(since = %since, error = %e, "Poll failed"),
        }

        // stop() may have run meanwhile; leave Stopped alone
        self.state.send_if_modified(|state| {
            if *state == PollState::AwaitingResponse {
                *state = PollState::Idle;
                true
            } else {
                false
            }
        });

        true
    }

    fn apply(&self, batch: MessageBatch) {
        let added = self.view.lock().merge(batch.messages);

        {
            let mut cursor = self.cursor.lock();
            if batch.cursor > *cursor {
                *cursor = batch.cursor;
            }
        }

        if added.is_empty() {
            return;
        }

        debug!(count = added.len(), "Received messages");
        let handlers = self.handlers.lock().clone();
        for message in &added {
            for handler in &handlers {
                handler(message);
            }
        }
    }
}

async fn poll_loop(inner: Arc<ClientInner>, mut shutdown: oneshot::Receiver<()>) {
    let mut ticker = interval(inner.config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                inner.poll_once().await;
            }
        }
    }

    debug!("Poll loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatterError;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;
    use uuid::Uuid;

    /// Replays scripted fetch results; an empty script means "nothing new"
    #[derive(Default)]
    struct ScriptedTransport {
        fetches: Mutex<VecDeque<Result<MessageBatch>>>,
        seen_cursors: Mutex<Vec<DateTime<Utc>>>,
        posted: Mutex<Vec<(String, String)>>,
        /// When set, every fetch waits for a notification
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedTransport {
        fn push(&self, result: Result<MessageBatch>) {
            self.fetches.lock().push_back(result);
        }

        fn fetch_count(&self) -> usize {
            self.seen_cursors.lock().len()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn post_message(&self, text: &str, author: &str) -> Result<Message> {
            self.posted.lock().push((text.to_string(), author.to_string()));
            Ok(message(text, Utc::now()))
        }

        async fn fetch_since(&self, since: DateTime<Utc>) -> Result<MessageBatch> {
            self.seen_cursors.lock().push(since);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            let next = self.fetches.lock().pop_front();
            next.unwrap_or_else(|| {
                Ok(MessageBatch {
                    messages: Vec::new(),
                    cursor: since,
                })
            })
        }
    }

    fn message(text: &str, at: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            text: text.to_string(),
            author: "abc".to_string(),
            owner: None,
            created_at: at,
        }
    }

    fn batch(messages: Vec<Message>) -> MessageBatch {
        let cursor = messages.last().map(|m| m.created_at).unwrap_or_else(Utc::now);
        MessageBatch { messages, cursor }
    }

    fn client(transport: Arc<ScriptedTransport>) -> ChatterClient {
        let config = ChatterConfig::new("http://unused")
            .author("abc")
            .poll_interval(Duration::from_millis(100))
            .since(DateTime::<Utc>::UNIX_EPOCH);
        ChatterClient::with_transport(config, transport)
    }

    #[tokio::test]
    async fn test_poll_applies_batch_and_advances_cursor() {
        let transport = Arc::new(ScriptedTransport::default());
        let t0 = Utc::now();
        let first = batch(vec![message("a", t0), message("b", t0 + ChronoDuration::seconds(1))]);
        transport.push(Ok(first.clone()));

        let client = client(transport.clone());
        assert!(client.poll_now().await);

        assert_eq!(client.messages(), first.messages);
        assert_eq!(client.cursor(), first.cursor);
        assert_eq!(client.poll_state(), PollState::Idle);

        // The next poll resumes from the server cursor
        client.poll_now().await;
        assert_eq!(transport.seen_cursors.lock()[1], first.cursor);
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_cursor() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(Err(ChatterError::Timeout));

        let client = client(transport.clone());
        let before = client.cursor();

        assert!(client.poll_now().await);
        assert_eq!(client.cursor(), before);
        assert!(client.messages().is_empty());
        assert_eq!(client.poll_state(), PollState::Idle);

        // The retry asks for the same window
        client.poll_now().await;
        let cursors = transport.seen_cursors.lock().clone();
        assert_eq!(cursors, vec![before, before]);
    }

    #[tokio::test]
    async fn test_replayed_batch_not_duplicated() {
        let transport = Arc::new(ScriptedTransport::default());
        let replay = batch(vec![message("a", Utc::now())]);
        transport.push(Ok(replay.clone()));
        transport.push(Ok(replay));

        let client = client(transport);
        client.poll_now().await;
        client.poll_now().await;

        assert_eq!(client.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_cursor_never_moves_backwards() {
        let transport = Arc::new(ScriptedTransport::default());
        let t0 = Utc::now();
        transport.push(Ok(batch(vec![message("late", t0)])));
        transport.push(Ok(MessageBatch {
            messages: Vec::new(),
            cursor: t0 - ChronoDuration::seconds(60),
        }));

        let client = client(transport);
        client.poll_now().await;
        client.poll_now().await;

        assert_eq!(client.cursor(), t0);
    }

    #[tokio::test]
    async fn test_no_overlapping_polls() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(ScriptedTransport {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let client = client(transport.clone());

        let mut state = client.state_receiver();
        let in_flight = tokio::spawn({
            let client = client.clone();
            async move { client.poll_now().await }
        });

        state
            .wait_for(|s| *s == PollState::AwaitingResponse)
            .await
            .unwrap();

        // A second poll while awaiting is a no-op
        assert!(!client.poll_now().await);
        assert_eq!(transport.fetch_count(), 1);

        gate.notify_one();
        assert!(in_flight.await.unwrap());
        assert_eq!(client.poll_state(), PollState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_does_not_interrupt_poll_in_flight() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(ScriptedTransport {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let client = client(transport.clone());

        let mut state = client.state_receiver();
        let in_flight = tokio::spawn({
            let client = client.clone();
            async move { client.poll_now().await }
        });
        state
            .wait_for(|s| *s == PollState::AwaitingResponse)
            .await
            .unwrap();

        client.start();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The loop's first tick found the manual poll still running
        assert_eq!(transport.fetch_count(), 1);
        assert_eq!(client.poll_state(), PollState::AwaitingResponse);

        gate.notify_one();
        assert!(in_flight.await.unwrap());
        client.stop().await;
        assert_eq!(transport.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_poll_in_flight_finish() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(ScriptedTransport {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let pending = batch(vec![message("a", Utc::now())]);
        transport.push(Ok(pending.clone()));
        let client = client(transport.clone());

        let mut state = client.state_receiver();
        client.start();
        state
            .wait_for(|s| *s == PollState::AwaitingResponse)
            .await
            .unwrap();

        let stopper = tokio::spawn({
            let client = client.clone();
            async move { client.stop().await }
        });
        while client.inner.shutdown.lock().is_some() {
            tokio::task::yield_now().await;
        }

        gate.notify_one();
        stopper.await.unwrap();

        assert_eq!(client.messages(), pending.messages);
        assert_eq!(client.cursor(), pending.cursor);
        assert_eq!(client.poll_state(), PollState::Stopped);
        assert_eq!(transport.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_send_posts_then_polls() {
        let transport = Arc::new(ScriptedTransport::default());
        let client = client(transport.clone());

        let sent = client.send("hi").await.unwrap();
        assert_eq!(sent.text, "hi");
        assert_eq!(
            transport.posted.lock().clone(),
            vec![("hi".to_string(), "abc".to_string())]
        );
        assert_eq!(transport.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_handlers_see_each_new_message_once() {
        let transport = Arc::new(ScriptedTransport::default());
        let replay = batch(vec![message("a", Utc::now())]);
        transport.push(Ok(replay.clone()));
        transport.push(Ok(replay));

        let client = client(transport);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        client.on_message(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        client.poll_now().await;
        client.poll_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_polls_on_interval_until_stopped() {
        let transport = Arc::new(ScriptedTransport::default());
        let client = client(transport.clone());

        client.start();
        client.start();
        tokio::time::sleep(Duration::from_millis(250)).await;

        // Ticks at 0, 100 and 200 ms
        assert_eq!(transport.fetch_count(), 3);

        client.stop().await;
        assert_eq!(client.poll_state(), PollState::Stopped);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(transport.fetch_count(), 3);
        assert!(!client.poll_now().await);
    }
}
