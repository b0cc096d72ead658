//! Connection session: one task per signaling WebSocket.
//!
//! The session owns the socket. A writer task drains the session's outbound
//! channel into the socket and pings the client every keepalive interval; the
//! session loop parses client frames and turns them into room requests. Any
//! inbound frame, a pong included, restarts the idle timer. When the socket closes, goes idle, or the client
//! sends `leave-room`, the room is told exactly once.

use crate::actors::RoomActorHandle;
use crate::admission::JoinRequest;
use crate::errors::RcError;

use super::protocol::{ClientMessage, ServerEvent, MAX_DISPLAY_NAME_LEN};
use super::{AppState, SessionSettings};

use axum::extract::ws::{Message, WebSocket};
use common::types::{ConnectionId, MediaId, RoomId};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Events buffered for the socket writer.
const OUTBOUND_BUFFER: usize = 256;

/// Attempts before a join against a repeatedly reclaimed room gives up.
const JOIN_ATTEMPTS: usize = 3;

/// Run a signaling session until the socket closes.
#[instrument(skip_all, name = "rc.signaling.session", fields(room_id = %room_id))]
pub async fn run_session(socket: WebSocket, room_id: RoomId, state: Arc<AppState>) {
    let connection_id = ConnectionId::new();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(write_events(
        sink,
        outbound_rx,
        state.settings.keepalive_interval(),
        connection_id,
    ));

    info!(
        target: "rc.signaling",
        connection_id = %connection_id,
        room_id = %room_id,
        "Session opened"
    );

    let mut session = Session {
        connection_id,
        room_id,
        state,
        outbound: outbound_tx,
        room: None,
    };

    let close_reason = loop {
        if writer.is_finished() {
            break "writer stopped";
        }

        let frame =
            match tokio::time::timeout(session.settings().idle_timeout, stream.next()).await {
                Err(_) => break "idle timeout",
                Ok(None) => break "socket closed",
                Ok(Some(Err(e))) => {
                    debug!(
                        target: "rc.signaling",
                        connection_id = %connection_id,
                        error = %e,
                        "Socket read failed"
                    );
                    break "socket error";
                }
                Ok(Some(Ok(frame))) => frame,
            };

        match frame {
            Message::Text(text) => session.handle_text(&text).await,
            Message::Binary(_) => {
                session.send_error(&RcError::Protocol(
                    "Binary frames are not supported".to_string(),
                ));
            }
            Message::Close(_) => break "client close",
            // Liveness only; the idle timer already restarted.
            Message::Ping(_) | Message::Pong(_) => {}
        }
    };

    session.leave().await;
    writer.abort();

    info!(
        target: "rc.signaling",
        connection_id = %connection_id,
        room_id = %session.room_id,
        reason = close_reason,
        "Session closed"
    );
}

/// Serialize outbound events onto the socket until either side goes away.
///
/// Between events the writer pings the client every `keepalive`, so a member
/// who only listens still produces pongs for the session's idle timer.
async fn write_events(
    mut sink: futures_util::stream::SplitSink<WebSocket, Message>,
    mut events: mpsc::Receiver<ServerEvent>,
    keepalive: Duration,
    connection_id: ConnectionId,
) {
    let mut ping_timer = tokio::time::interval_at(Instant::now() + keepalive, keepalive);
    ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let frame = tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_string(&event) {
                    Ok(text) => Message::Text(text),
                    Err(e) => {
                        warn!(
                            target: "rc.signaling",
                            connection_id = %connection_id,
                            event = event.kind(),
                            error = %e,
                            "Failed to serialize event"
                        );
                        continue;
                    }
                }
            }
            _ = ping_timer.tick() => Message::Ping(Vec::new()),
        };

        if sink.send(frame).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

struct Session {
    connection_id: ConnectionId,
    room_id: RoomId,
    state: Arc<AppState>,
    outbound: mpsc::Sender<ServerEvent>,
    /// Set once `join-room` has reached a room.
    room: Option<RoomActorHandle>,
}

impl Session {
    fn settings(&self) -> SessionSettings {
        self.state.settings
    }

    async fn handle_text(&mut self, text: &str) {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(
                    target: "rc.signaling",
                    connection_id = %self.connection_id,
                    error = %e,
                    "Unparsable client message"
                );
                self.send_error(&RcError::Protocol(
                    "Malformed or unknown message".to_string(),
                ));
                return;
            }
        };

        let kind = message.kind();
        if let Err(e) = self.dispatch(message).await {
            debug!(
                target: "rc.signaling",
                connection_id = %self.connection_id,
                message = kind,
                error = %e,
                "Client message rejected"
            );
            self.send_error(&e);
        }
    }

    async fn dispatch(&mut self, message: ClientMessage) -> Result<(), RcError> {
        match message {
            ClientMessage::JoinRoom {
                name,
                is_host,
                media_id,
            } => self.join(name, is_host, media_id).await,

            ClientMessage::RespondEntry {
                requester_id,
                allow,
            } => {
                let room = self.joined_room()?;
                let result = room
                    .respond_entry(self.connection_id, requester_id, allow)
                    .await;
                self.forget_closed_room(result)
            }

            ClientMessage::MediaToggle { kind, enabled } => {
                let room = self.joined_room()?;
                let result = room.media_toggle(self.connection_id, kind, enabled).await;
                self.forget_closed_room(result)
            }

            ClientMessage::Message { text } => {
                let max = self.settings().max_chat_length;
                if text.chars().count() > max {
                    return Err(RcError::Protocol(format!(
                        "Chat message exceeds {max} characters"
                    )));
                }
                let room = self.joined_room()?;
                let result = room.chat(self.connection_id, text).await;
                self.forget_closed_room(result)
            }

            ClientMessage::LeaveRoom => {
                self.leave().await;
                Ok(())
            }
        }
    }

    async fn join(&mut self, name: String, is_host: bool, media_id: MediaId) -> Result<(), RcError> {
        let name = validate_display_name(&name)?;
        let request = JoinRequest {
            connection_id: self.connection_id,
            name,
            media_id,
            is_host,
        };

        for attempt in 1..=JOIN_ATTEMPTS {
            let room = self
                .state
                .controller
                .get_or_create_room(self.room_id.clone())
                .await?;

            match room.join(request.clone(), self.outbound.clone()).await {
                Ok(outcome) => {
                    debug!(
                        target: "rc.signaling",
                        connection_id = %self.connection_id,
                        room_id = %self.room_id,
                        outcome = outcome.as_str(),
                        "Join request handled"
                    );
                    self.room = Some(room);
                    return Ok(());
                }
                Err(RcError::RoomClosed) => {
                    debug!(
                        target: "rc.signaling",
                        connection_id = %self.connection_id,
                        room_id = %self.room_id,
                        attempt = attempt,
                        "Room was reclaimed during join, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(RcError::Internal(format!(
            "room {} closed on {JOIN_ATTEMPTS} join attempts",
            self.room_id
        )))
    }

    /// Tell the room this connection is gone. No-op when not in a room.
    async fn leave(&mut self) {
        if let Some(room) = self.room.take() {
            let _ = room.connection_disconnected(self.connection_id).await;
        }
    }

    fn joined_room(&self) -> Result<RoomActorHandle, RcError> {
        self.room.clone().ok_or(RcError::NotJoined)
    }

    /// A closed room means this connection was already removed from it.
    fn forget_closed_room(&mut self, result: Result<(), RcError>) -> Result<(), RcError> {
        match result {
            Err(RcError::RoomClosed) => {
                self.room = None;
                Err(RcError::NotJoined)
            }
            other => other,
        }
    }

    fn send_error(&self, err: &RcError) {
        if self.outbound.try_send(ServerEvent::from_error(err)).is_err() {
            warn!(
                target: "rc.signaling",
                connection_id = %self.connection_id,
                "Outbound full, error event dropped"
            );
        }
    }
}

/// Trim and bound a display name.
fn validate_display_name(raw: &str) -> Result<String, RcError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RcError::Protocol("Display name is required".to_string()));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(RcError::Protocol(format!(
            "Display name exceeds {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}
