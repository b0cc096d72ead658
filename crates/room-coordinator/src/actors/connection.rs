//! `ConnectionActor` - per-connection routing actor.
//!
//! Each `ConnectionActor`:
//! - Stands for exactly one admitted or pending socket in one room
//! - Receives `ServerEvent`s from its `RoomActor` and forwards them to the
//!   session's outbound channel without ever blocking the room
//! - Exits on `Close`, on cancellation, or once the session is gone
//!
//! # Lifecycle
//!
//! 1. Spawned by the `RoomActor` when a `join-room` arrives
//! 2. Runs until the request is denied, the member leaves, or the room drains
//! 3. Cancellation via child token propagates from the `RoomActor`

use crate::errors::RcError;
use crate::observability::metrics as prom;
use crate::signaling::protocol::ServerEvent;

use super::messages::ConnectionMessage;
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use common::types::{ConnectionId, RoomId};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Default channel buffer size for the connection mailbox.
const CONNECTION_CHANNEL_BUFFER: usize = 200;

/// Handle to a `ConnectionActor`.
#[derive(Clone, Debug)]
pub struct ConnectionActorHandle {
    sender: mpsc::Sender<ConnectionMessage>,
    cancel_token: CancellationToken,
    connection_id: ConnectionId,
}

impl ConnectionActorHandle {
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Queue an event for the client without waiting for mailbox space.
    ///
    /// # Errors
    ///
    /// `RcError::Internal` when the mailbox is full or the actor is gone.
    pub fn deliver(&self, event: ServerEvent) -> Result<(), RcError> {
        self.try_send(ConnectionMessage::Deliver { event })
    }

    /// Queue a close. Events queued before it are still forwarded.
    ///
    /// # Errors
    ///
    /// `RcError::Internal` when the mailbox is full or the actor is gone.
    pub fn close(&self, reason: &'static str) -> Result<(), RcError> {
        self.try_send(ConnectionMessage::Close { reason })
    }

    /// Cancel the connection actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    fn try_send(&self, message: ConnectionMessage) -> Result<(), RcError> {
        self.sender.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => RcError::Internal("connection mailbox full".to_string()),
            TrySendError::Closed(_) => {
                RcError::Internal("connection mailbox closed".to_string())
            }
        })
    }
}

/// The `ConnectionActor` implementation.
pub struct ConnectionActor {
    connection_id: ConnectionId,
    room_id: RoomId,
    receiver: mpsc::Receiver<ConnectionMessage>,
    /// Child of the room's token.
    cancel_token: CancellationToken,
    /// Session-owned channel feeding the WebSocket writer.
    outbound: mpsc::Sender<ServerEvent>,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl ConnectionActor {
    /// Spawn a new connection actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        connection_id: ConnectionId,
        room_id: RoomId,
        outbound: mpsc::Sender<ServerEvent>,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (ConnectionActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(CONNECTION_CHANNEL_BUFFER);

        let actor = Self {
            connection_id,
            room_id,
            receiver,
            cancel_token: cancel_token.clone(),
            outbound,
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Connection, connection_id.to_string()),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = ConnectionActorHandle {
            sender,
            cancel_token,
            connection_id,
        };

        (handle, task_handle)
    }

    #[instrument(
        skip_all,
        name = "rc.actor.connection",
        fields(connection_id = %self.connection_id, room_id = %self.room_id)
    )]
    async fn run(mut self) {
        debug!(
            target: "rc.actor.connection",
            connection_id = %self.connection_id,
            room_id = %self.room_id,
            "ConnectionActor started"
        );

        let mut exit_reason = "channel closed";
        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    exit_reason = "cancelled";
                    break;
                }

                msg = self.receiver.recv() => {
                    let Some(message) = msg else {
                        break;
                    };
                    self.mailbox.record_receive(self.receiver.len());
                    let exit = self.handle_message(message);
                    self.mailbox.record_handled(self.receiver.len());
                    self.metrics.record_message_processed();

                    if let Some(reason) = exit {
                        exit_reason = reason;
                        break;
                    }
                }
            }
        }

        debug!(
            target: "rc.actor.connection",
            connection_id = %self.connection_id,
            room_id = %self.room_id,
            reason = exit_reason,
            messages_processed = self.mailbox.messages_processed(),
            "ConnectionActor stopped"
        );
    }

    /// Handle a single message. Returns the exit reason if the actor should stop.
    fn handle_message(&mut self, message: ConnectionMessage) -> Option<&'static str> {
        match message {
            ConnectionMessage::Deliver { event } => self.forward(event),
            ConnectionMessage::Close { reason } => Some(reason),
        }
    }

    fn forward(&self, event: ServerEvent) -> Option<&'static str> {
        let kind = event.kind();
        match self.outbound.try_send(event) {
            Ok(()) => None,
            Err(TrySendError::Full(_)) => {
                warn!(
                    target: "rc.actor.connection",
                    connection_id = %self.connection_id,
                    event = kind,
                    "Client outbound queue full, event dropped"
                );
                prom::record_delivery_failure("full");
                None
            }
            Err(TrySendError::Closed(_)) => {
                debug!(
                    target: "rc.actor.connection",
                    connection_id = %self.connection_id,
                    event = kind,
                    "Client outbound closed, stopping"
                );
                prom::record_delivery_failure("closed");
                Some("session gone")
            }
        }
    }
}
