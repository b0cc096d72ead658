//! Signaling protocol - JSON messages exchanged over the room WebSocket.
//!
//! Every frame is a single JSON object discriminated by its `type` field.

use common::types::{ConnectionId, MediaId};
use serde::{Deserialize, Serialize};

/// Maximum display-name length in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 64;

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Ask to enter the room bound to this socket.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        name: String,
        #[serde(default)]
        is_host: bool,
        media_id: MediaId,
    },
    /// Host decision on a pending entry request.
    #[serde(rename_all = "camelCase")]
    RespondEntry {
        requester_id: ConnectionId,
        allow: bool,
    },
    /// Local microphone, camera or screen-share state changed.
    MediaToggle { kind: MediaKind, enabled: bool },
    /// Chat text for the whole room.
    Message { text: String },
    /// Leave the room but keep the socket open.
    LeaveRoom,
}

impl ClientMessage {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            ClientMessage::JoinRoom { .. } => "join-room",
            ClientMessage::RespondEntry { .. } => "respond-entry",
            ClientMessage::MediaToggle { .. } => "media-toggle",
            ClientMessage::Message { .. } => "message",
            ClientMessage::LeaveRoom => "leave-room",
        }
    }
}

/// Server-to-client events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A peer was admitted; open a media link to `media_id`.
    #[serde(rename_all = "camelCase")]
    UserConnected {
        connection_id: ConnectionId,
        media_id: MediaId,
        name: String,
    },
    /// A member left; tear down the media link to `media_id`.
    #[serde(rename_all = "camelCase")]
    UserDisconnected {
        connection_id: ConnectionId,
        media_id: MediaId,
        name: String,
        was_host: bool,
    },
    /// Host reference changed; `None` means the room is host-less.
    #[serde(rename_all = "camelCase")]
    HostChanged {
        host_id: Option<ConnectionId>,
        name: Option<String>,
    },
    /// Sent to the host only.
    #[serde(rename_all = "camelCase")]
    EntryRequested {
        requester_id: ConnectionId,
        name: String,
        media_id: MediaId,
    },
    /// Sent to the admitted connection with the current member list.
    #[serde(rename_all = "camelCase")]
    EntryGranted {
        connection_id: ConnectionId,
        host_id: Option<ConnectionId>,
        members: Vec<MemberInfo>,
    },
    #[serde(rename_all = "camelCase")]
    EntryDenied { reason: DenyReason },
    #[serde(rename_all = "camelCase")]
    MediaStateChanged {
        peer_id: ConnectionId,
        media_id: MediaId,
        kind: MediaKind,
        enabled: bool,
    },
    #[serde(rename = "createMessage", rename_all = "camelCase")]
    CreateMessage {
        text: String,
        sender_id: ConnectionId,
        sender_name: String,
    },
    /// Protocol or request error, sent to the offending client only.
    Error { code: i32, message: String },
}

impl ServerEvent {
    /// Wire name of the event, used as a bounded metric label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            ServerEvent::UserConnected { .. } => "user-connected",
            ServerEvent::UserDisconnected { .. } => "user-disconnected",
            ServerEvent::HostChanged { .. } => "host-changed",
            ServerEvent::EntryRequested { .. } => "entry-requested",
            ServerEvent::EntryGranted { .. } => "entry-granted",
            ServerEvent::EntryDenied { .. } => "entry-denied",
            ServerEvent::MediaStateChanged { .. } => "media-state-changed",
            ServerEvent::CreateMessage { .. } => "createMessage",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Build an `error` event from a coordinator error.
    #[must_use]
    pub fn from_error(err: &crate::errors::RcError) -> Self {
        ServerEvent::Error {
            code: err.error_code(),
            message: err.client_message(),
        }
    }
}

/// Media track kinds a member can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Screen,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Screen => "screen",
        }
    }
}

/// Why an entry request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    /// The host declined.
    Host,
    /// No decision within the pending-entry timeout.
    Timeout,
    /// The host left before deciding.
    HostLeft,
    /// The room has no free seats.
    RoomFull,
}

impl DenyReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Host => "host",
            DenyReason::Timeout => "timeout",
            DenyReason::HostLeft => "host-left",
            DenyReason::RoomFull => "room-full",
        }
    }
}

/// Member entry carried by `entry-granted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub connection_id: ConnectionId,
    pub media_id: MediaId,
    pub name: String,
    pub is_host: bool,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub screen_sharing: bool,
}
