//! Message types for actor communication.
//!
//! Every request that needs an answer carries a `oneshot` `respond_to`.
//! Fire-and-forget messages (decisions, toggles, chat, disconnects) have no
//! reply; their effects are observed through the events they produce.

use crate::admission::{JoinOutcome, JoinRequest};
use crate::errors::RcError;
use crate::registry::RoomSnapshot;
use crate::signaling::protocol::{MediaKind, ServerEvent};

use super::room::RoomActorHandle;

use common::types::{ConnectionId, RoomId};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Messages handled by the `RoomControllerActor`.
#[derive(Debug)]
pub enum ControllerMessage {
    /// Return the live room for `room_id`, spawning it on first use.
    GetOrCreateRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Result<RoomActorHandle, RcError>>,
    },

    /// Return the live room for `room_id` without creating one.
    GetRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Result<RoomActorHandle, RcError>>,
    },

    GetStatus {
        respond_to: oneshot::Sender<ControllerStatus>,
    },

    /// Stop accepting new rooms and drain the existing ones.
    Shutdown {
        deadline: Duration,
        respond_to: oneshot::Sender<Result<(), RcError>>,
    },
}

/// Messages handled by a `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Admit a connection. `outbound` is where that connection's events go.
    Join {
        request: JoinRequest,
        outbound: mpsc::Sender<ServerEvent>,
        respond_to: oneshot::Sender<Result<JoinOutcome, RcError>>,
    },

    /// Host decision on a pending entry request.
    RespondEntry {
        responder: ConnectionId,
        requester: ConnectionId,
        allow: bool,
    },

    MediaToggle {
        connection_id: ConnectionId,
        kind: MediaKind,
        enabled: bool,
    },

    /// Chat text, already length-checked by the session.
    Chat {
        connection_id: ConnectionId,
        text: String,
    },

    /// The socket closed or the client left. Idempotent.
    ConnectionDisconnected { connection_id: ConnectionId },

    GetSnapshot {
        respond_to: oneshot::Sender<RoomSnapshot>,
    },
}

/// Messages handled by a `ConnectionActor`.
#[derive(Debug)]
pub enum ConnectionMessage {
    /// Forward an event to the client's outbound channel.
    Deliver { event: ServerEvent },

    /// Stop routing to this connection. Sent after any final events.
    Close { reason: &'static str },
}

/// Current controller status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerStatus {
    pub room_count: usize,
    pub connection_count: usize,
    pub is_draining: bool,
    pub mailbox_depth: usize,
}
