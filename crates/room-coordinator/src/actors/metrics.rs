//! Actor bookkeeping and mailbox monitoring.
//!
//! Mailbox depth thresholds per actor type:
//!
//! | Actor Type | Normal | Warning | Critical |
//! |------------|--------|---------|----------|
//! | Controller | < 100  | 100-500 | > 500    |
//! | Room       | < 100  | 100-500 | > 500    |
//! | Connection | < 50   | 50-200  | > 200    |
//!
//! `ActorMetrics` keeps the room and connection counts in process and mirrors
//! them into the `rc_rooms_active` / `rc_connections_active` gauges.

use crate::observability::metrics as prom;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mailbox depth thresholds for room (and controller) actors.
pub const ROOM_MAILBOX_NORMAL: usize = 100;
pub const ROOM_MAILBOX_WARNING: usize = 500;

/// Mailbox depth thresholds for connection actors.
pub const CONNECTION_MAILBOX_NORMAL: usize = 50;
pub const CONNECTION_MAILBOX_WARNING: usize = 200;

/// Actor type for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// `RoomControllerActor` (singleton).
    Controller,
    /// `RoomActor` (one per room).
    Room,
    /// `ConnectionActor` (one per admitted or pending socket).
    Connection,
}

impl ActorType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Controller => "controller",
            ActorType::Room => "room",
            ActorType::Connection => "connection",
        }
    }

    #[must_use]
    pub const fn normal_threshold(&self) -> usize {
        match self {
            ActorType::Controller | ActorType::Room => ROOM_MAILBOX_NORMAL,
            ActorType::Connection => CONNECTION_MAILBOX_NORMAL,
        }
    }

    #[must_use]
    pub const fn warning_threshold(&self) -> usize {
        match self {
            ActorType::Controller | ActorType::Room => ROOM_MAILBOX_WARNING,
            ActorType::Connection => CONNECTION_MAILBOX_WARNING,
        }
    }

    /// Classify a mailbox depth against this actor's thresholds.
    #[must_use]
    pub const fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth > self.warning_threshold() {
            MailboxLevel::Critical
        } else if depth > self.normal_threshold() {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Tracks queue depth for one actor's mailbox.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    /// Room id or connection id.
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record a message taken off the channel, with `backlog` still queued
    /// behind it (`Receiver::len` after the receive).
    pub fn record_receive(&self, backlog: usize) {
        let depth = backlog + 1;
        let previous = self.depth.swap(depth, Ordering::Relaxed);
        self.peak_depth.fetch_max(depth, Ordering::Relaxed);

        match self.actor_type.level_for_depth(depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "rc.actor.mailbox",
                    actor_type = self.actor_type.as_str(),
                    actor_id = %self.actor_id,
                    depth = depth,
                    threshold = self.actor_type.warning_threshold(),
                    "Mailbox depth critical"
                );
            }
            // Logged once per climb past the normal threshold.
            MailboxLevel::Warning
                if self.actor_type.level_for_depth(previous) == MailboxLevel::Normal =>
            {
                debug!(
                    target: "rc.actor.mailbox",
                    actor_type = self.actor_type.as_str(),
                    actor_id = %self.actor_id,
                    depth = depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message finished, with `backlog` messages now waiting.
    pub fn record_handled(&self, backlog: usize) {
        self.depth.store(backlog, Ordering::Relaxed);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        self.actor_type.level_for_depth(self.current_depth())
    }
}

/// Process-wide actor counters shared by every actor.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    active_rooms: AtomicUsize,
    active_connections: AtomicUsize,
    actor_panics: AtomicU64,
    total_messages_processed: AtomicU64,
}

impl ActorMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn room_created(&self) {
        let count = self.active_rooms.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_rooms_active(count);
    }

    pub fn room_removed(&self) {
        let count = saturating_decrement(&self.active_rooms);
        prom::set_rooms_active(count);
    }

    pub fn connection_created(&self) {
        let count = self.active_connections.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_connections_active(count);
    }

    pub fn connection_closed(&self) {
        let count = saturating_decrement(&self.active_connections);
        prom::set_connections_active(count);
    }

    /// Record an actor panic. Any panic is a bug.
    pub fn record_panic(&self, actor_type: ActorType) {
        let total = self.actor_panics.fetch_add(1, Ordering::Relaxed) + 1;
        prom::record_actor_panic(actor_type.as_str());
        tracing::error!(
            target: "rc.actor.panic",
            actor_type = actor_type.as_str(),
            total_panics = total,
            "Actor panic detected - indicates bug, investigation required"
        );
    }

    pub fn record_message_processed(&self) {
        self.total_messages_processed
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.active_rooms.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn panic_count(&self) -> u64 {
        self.actor_panics.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.total_messages_processed.load(Ordering::Relaxed)
    }
}

/// Decrement without wrapping below zero, returning the new value.
fn saturating_decrement(counter: &AtomicUsize) -> usize {
    let previous = counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
            Some(n.saturating_sub(1))
        })
        .unwrap_or_default();
    previous.saturating_sub(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_type_labels_and_thresholds() {
        assert_eq!(ActorType::Controller.as_str(), "controller");
        assert_eq!(ActorType::Room.as_str(), "room");
        assert_eq!(ActorType::Connection.as_str(), "connection");

        assert_eq!(ActorType::Room.normal_threshold(), 100);
        assert_eq!(ActorType::Room.warning_threshold(), 500);
        assert_eq!(ActorType::Connection.normal_threshold(), 50);
        assert_eq!(ActorType::Connection.warning_threshold(), 200);
    }

    #[test]
    fn test_mailbox_monitor_tracks_depth_and_peak() {
        let monitor = MailboxMonitor::new(ActorType::Room, "standup");

        // Three queued: one in hand, two behind it.
        monitor.record_receive(2);
        assert_eq!(monitor.current_depth(), 3);

        monitor.record_handled(2);
        monitor.record_receive(1);
        monitor.record_handled(1);
        assert_eq!(monitor.current_depth(), 1);
        assert_eq!(monitor.peak_depth(), 3);
        assert_eq!(monitor.messages_processed(), 2);

        monitor.record_receive(0);
        monitor.record_handled(0);
        assert_eq!(monitor.current_depth(), 0);
    }

    #[test]
    fn test_mailbox_levels_per_actor_type() {
        let room = MailboxMonitor::new(ActorType::Room, "standup");
        room.record_receive(149);
        assert_eq!(room.current_level(), MailboxLevel::Warning);
        room.record_receive(549);
        assert_eq!(room.current_level(), MailboxLevel::Critical);
        room.record_handled(10);
        assert_eq!(room.current_level(), MailboxLevel::Normal);

        let conn = MailboxMonitor::new(ActorType::Connection, "conn-1");
        assert_eq!(conn.current_level(), MailboxLevel::Normal);
        conn.record_receive(74);
        assert_eq!(conn.current_level(), MailboxLevel::Warning);
    }

    #[test]
    fn test_actor_metrics_counts() {
        let metrics = ActorMetrics::new();

        metrics.room_created();
        metrics.room_created();
        metrics.connection_created();
        assert_eq!(metrics.room_count(), 2);
        assert_eq!(metrics.connection_count(), 1);

        metrics.room_removed();
        metrics.connection_closed();
        assert_eq!(metrics.room_count(), 1);
        assert_eq!(metrics.connection_count(), 0);
    }

    #[test]
    fn test_actor_metrics_never_underflow() {
        let metrics = ActorMetrics::new();
        metrics.connection_closed();
        metrics.room_removed();
        assert_eq!(metrics.connection_count(), 0);
        assert_eq!(metrics.room_count(), 0);
    }

    #[test]
    fn test_actor_metrics_panics() {
        let metrics = ActorMetrics::new();
        metrics.record_panic(ActorType::Room);
        metrics.record_panic(ActorType::Connection);
        assert_eq!(metrics.panic_count(), 2);
    }
}
