//! Timed assertions over an mpsc event channel.
//!
//! The room delivers events into a bounded `mpsc::Sender`. A probe owns the
//! receiving half and fails the test when an expected event does not show up
//! in time, or when an unexpected one does.

use std::fmt::Debug;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long `expect_event` waits before failing.
pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long `expect_silence` listens.
pub const DEFAULT_SILENCE_WINDOW: Duration = Duration::from_millis(100);

/// Receiver wrapper with timed expectations.
#[derive(Debug)]
pub struct EventProbe<E> {
    receiver: mpsc::Receiver<E>,
    timeout: Duration,
}

impl<E: Debug> EventProbe<E> {
    /// Create a channel and a probe over its receiving half.
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<E>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }

    /// Wrap an existing receiver.
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<E>) -> Self {
        Self {
            receiver,
            timeout: DEFAULT_EVENT_TIMEOUT,
        }
    }

    /// Override the per-event timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Next event, or `None` on timeout or when every sender is gone.
    pub async fn next(&mut self) -> Option<E> {
        tokio::time::timeout(self.timeout, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next event, failing the test with `what` when nothing arrives.
    ///
    /// # Panics
    ///
    /// Panics on timeout or when the channel is closed.
    pub async fn expect_event(&mut self, what: &str) -> E {
        match self.next().await {
            Some(event) => event,
            None => panic!("expected {what}, but no event arrived"),
        }
    }

    /// Assert nothing arrives within [`DEFAULT_SILENCE_WINDOW`].
    ///
    /// # Panics
    ///
    /// Panics if an event is received.
    pub async fn expect_silence(&mut self) {
        self.expect_silence_for(DEFAULT_SILENCE_WINDOW).await;
    }

    /// Assert nothing arrives within `window`. A closed channel counts as silence.
    ///
    /// # Panics
    ///
    /// Panics if an event is received.
    pub async fn expect_silence_for(&mut self, window: Duration) {
        if let Ok(Some(event)) = tokio::time::timeout(window, self.receiver.recv()).await {
            panic!("expected silence, got {event:?}");
        }
    }

    /// Take everything already queued without waiting.
    pub fn drain(&mut self) -> Vec<E> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// True once every sender is dropped and the queue is empty.
    pub async fn is_closed(&mut self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, self.receiver.recv()).await,
            Ok(None)
        )
    }
}
