//! `RoomActor` - per-room actor that owns room state.
//!
//! Each `RoomActor`:
//! - Owns the `RoomState` for one room (host, members, pending requests)
//! - Runs every admission decision through [`crate::admission`] in mailbox
//!   order, so all mutations of one room are linearizable
//! - Supervises one `ConnectionActor` per admitted or pending connection via
//!   the room's [`Relay`]
//!
//! # Periodic work
//!
//! A one-second tick expires pending entry requests and reaps connection
//! actors whose session went away.
//!
//! # Reclaim
//!
//! When the last member or pending requester goes, the actor closes its
//! mailbox, answers any queued `Join` with `RcError::RoomClosed` and exits.
//! A room that was created but never joined is reclaimed after
//! [`EMPTY_ROOM_GRACE`].

use crate::admission::{
    self, AdmissionPolicy, Decision, Departure, JoinOutcome, JoinRequest, RespondOutcome,
};
use crate::errors::RcError;
use crate::observability::metrics as prom;
use crate::registry::{MediaUpdate, RoomSnapshot, RoomState};
use crate::relay::{Audience, Outbound, Relay};
use crate::signaling::protocol::{MediaKind, ServerEvent};

use super::connection::ConnectionActor;
use super::messages::RoomMessage;
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use common::types::{ConnectionId, RoomId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Default channel buffer size for the room mailbox.
const ROOM_CHANNEL_BUFFER: usize = 500;

/// Pending-timeout and connection-health check period.
const ROOM_TICK: Duration = Duration::from_secs(1);

/// How long a room that never had anyone in it is kept.
pub const EMPTY_ROOM_GRACE: Duration = Duration::from_secs(5);

/// Wait per connection actor during shutdown.
const CONNECTION_SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// Handle to a `RoomActor`.
#[derive(Clone, Debug)]
pub struct RoomActorHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    room_id: RoomId,
}

impl RoomActorHandle {
    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Ask the room to admit a connection.
    ///
    /// `outbound` receives every event addressed to this connection, starting
    /// with `entry-granted` or `entry-denied` when the decision is immediate.
    ///
    /// # Errors
    ///
    /// `RcError::RoomClosed` if the room was reclaimed before the request was
    /// handled; the caller should fetch a fresh room and retry.
    pub async fn join(
        &self,
        request: JoinRequest,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Result<JoinOutcome, RcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::Join {
                request,
                outbound,
                respond_to: tx,
            })
            .await
            .map_err(|_| RcError::RoomClosed)?;

        rx.await.map_err(|_| RcError::RoomClosed)?
    }

    /// Forward a host's allow/deny decision.
    ///
    /// # Errors
    ///
    /// `RcError::RoomClosed` if the room actor has exited.
    pub async fn respond_entry(
        &self,
        responder: ConnectionId,
        requester: ConnectionId,
        allow: bool,
    ) -> Result<(), RcError> {
        self.send(RoomMessage::RespondEntry {
            responder,
            requester,
            allow,
        })
        .await
    }

    /// # Errors
    ///
    /// `RcError::RoomClosed` if the room actor has exited.
    pub async fn media_toggle(
        &self,
        connection_id: ConnectionId,
        kind: MediaKind,
        enabled: bool,
    ) -> Result<(), RcError> {
        self.send(RoomMessage::MediaToggle {
            connection_id,
            kind,
            enabled,
        })
        .await
    }

    /// # Errors
    ///
    /// `RcError::RoomClosed` if the room actor has exited.
    pub async fn chat(&self, connection_id: ConnectionId, text: String) -> Result<(), RcError> {
        self.send(RoomMessage::Chat {
            connection_id,
            text,
        })
        .await
    }

    /// Report that a connection left. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// `RcError::RoomClosed` if the room actor has exited.
    pub async fn connection_disconnected(
        &self,
        connection_id: ConnectionId,
    ) -> Result<(), RcError> {
        self.send(RoomMessage::ConnectionDisconnected { connection_id })
            .await
    }

    /// # Errors
    ///
    /// `RcError::RoomClosed` if the room actor has exited.
    pub async fn get_snapshot(&self) -> Result<RoomSnapshot, RcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send(RoomMessage::GetSnapshot { respond_to: tx }).await?;
        rx.await.map_err(|_| RcError::RoomClosed)
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// True once the room stopped taking messages (reclaimed or shut down).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed() || self.cancel_token.is_cancelled()
    }

    async fn send(&self, message: RoomMessage) -> Result<(), RcError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| RcError::RoomClosed)
    }
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    room_id: RoomId,
    receiver: mpsc::Receiver<RoomMessage>,
    /// Child of the controller's token.
    cancel_token: CancellationToken,
    state: RoomState,
    relay: Relay,
    policy: AdmissionPolicy,
    created_at: Instant,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl RoomActor {
    /// Spawn a new room actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        room_id: RoomId,
        policy: AdmissionPolicy,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (RoomActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);

        let actor = Self {
            room_id: room_id.clone(),
            receiver,
            cancel_token: cancel_token.clone(),
            state: RoomState::new(),
            relay: Relay::new(room_id.clone(), Arc::clone(&metrics)),
            policy,
            created_at: Instant::now(),
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Room, room_id.as_str()),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomActorHandle {
            sender,
            cancel_token,
            room_id,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "rc.actor.room", fields(room_id = %self.room_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            hostless_policy = %self.policy.hostless,
            host_departure_policy = %self.policy.host_departure,
            "RoomActor started"
        );

        let mut tick = tokio::time::interval(ROOM_TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.room",
                        room_id = %self.room_id,
                        "RoomActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                _ = tick.tick() => {
                    let occupied = !self.state.is_empty();
                    self.expire_pending();
                    self.check_connection_health().await;

                    let never_used = self.state.is_empty()
                        && self.created_at.elapsed() >= EMPTY_ROOM_GRACE;
                    if (occupied && self.state.is_empty()) || never_used {
                        self.reclaim();
                        break;
                    }
                }

                msg = self.receiver.recv() => {
                    let Some(message) = msg else {
                        break;
                    };
                    let occupied = !self.state.is_empty();

                    self.mailbox.record_receive(self.receiver.len());
                    self.handle_message(message);
                    self.mailbox.record_handled(self.receiver.len());
                    self.metrics.record_message_processed();

                    if occupied && self.state.is_empty() {
                        self.reclaim();
                        break;
                    }
                }
            }
        }

        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            members = self.state.member_count(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomActor stopped"
        );
    }

    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join {
                request,
                outbound,
                respond_to,
            } => {
                let outcome = self.handle_join(&request, outbound);
                let _ = respond_to.send(Ok(outcome));
            }

            RoomMessage::RespondEntry {
                responder,
                requester,
                allow,
            } => {
                let decision = admission::respond(
                    &mut self.state,
                    &self.policy,
                    responder,
                    requester,
                    allow,
                    Instant::now(),
                );
                match decision.outcome {
                    RespondOutcome::Granted => prom::record_admission("granted"),
                    RespondOutcome::Denied(_) => prom::record_admission("denied"),
                    RespondOutcome::NotHost | RespondOutcome::NoRequest => {}
                }
                self.apply(decision);
            }

            RoomMessage::MediaToggle {
                connection_id,
                kind,
                enabled,
            } => self.handle_media_toggle(connection_id, kind, enabled),

            RoomMessage::Chat {
                connection_id,
                text,
            } => self.handle_chat(connection_id, text),

            RoomMessage::ConnectionDisconnected { connection_id } => {
                self.handle_departure(connection_id);
            }

            RoomMessage::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.state.snapshot());
            }
        }
    }

    fn handle_join(
        &mut self,
        request: &JoinRequest,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> JoinOutcome {
        let conn = request.connection_id;

        // The route has to exist before admission so `entry-granted` or
        // `entry-denied` can reach the newcomer.
        let known = self.state.is_member(conn) || self.state.is_pending(conn);
        if !known && !self.relay.has_route(conn) {
            let (handle, task_handle) = ConnectionActor::spawn(
                conn,
                self.room_id.clone(),
                outbound,
                self.cancel_token.child_token(),
                Arc::clone(&self.metrics),
            );
            self.relay.attach(handle, task_handle);
        }

        let decision = admission::admit(&mut self.state, &self.policy, request, Instant::now());
        let outcome = decision.outcome;
        prom::record_admission(outcome.as_str());

        debug!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            connection_id = %conn,
            is_host = request.is_host,
            outcome = outcome.as_str(),
            members = self.state.member_count(),
            pending = self.state.pending_count(),
            "Join handled"
        );

        self.apply(decision);
        outcome
    }

    fn handle_media_toggle(&mut self, conn: ConnectionId, kind: MediaKind, enabled: bool) {
        match self.state.set_media_state(conn, kind, enabled) {
            MediaUpdate::Changed => {
                let Some(media_id) = self.state.member(conn).map(|m| m.media_id.clone()) else {
                    return;
                };
                self.relay.deliver(
                    &self.state,
                    Outbound {
                        audience: Audience::Room { except: Some(conn) },
                        event: ServerEvent::MediaStateChanged {
                            peer_id: conn,
                            media_id,
                            kind,
                            enabled,
                        },
                    },
                );
            }
            MediaUpdate::Unchanged => {}
            MediaUpdate::NotMember => {
                debug!(
                    target: "rc.actor.room",
                    room_id = %self.room_id,
                    connection_id = %conn,
                    kind = kind.as_str(),
                    "Media toggle from non-member ignored"
                );
            }
        }
    }

    fn handle_chat(&mut self, conn: ConnectionId, text: String) {
        let Some(sender_name) = self.state.member(conn).map(|m| m.name.clone()) else {
            debug!(
                target: "rc.actor.room",
                room_id = %self.room_id,
                connection_id = %conn,
                "Chat from non-member ignored"
            );
            return;
        };

        debug!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            connection_id = %conn,
            text_len = text.len(),
            "Relaying chat message"
        );

        self.relay.deliver(
            &self.state,
            Outbound {
                audience: Audience::Room { except: None },
                event: ServerEvent::CreateMessage {
                    text,
                    sender_id: conn,
                    sender_name,
                },
            },
        );
    }

    fn handle_departure(&mut self, conn: ConnectionId) {
        let decision = admission::depart(&mut self.state, &self.policy, conn);
        let outcome = decision.outcome;

        // The departing socket is gone; drop its route without a close.
        self.relay.detach(conn);
        self.apply(decision);

        match outcome {
            Departure::Member { was_host } => {
                info!(
                    target: "rc.actor.room",
                    room_id = %self.room_id,
                    connection_id = %conn,
                    was_host = was_host,
                    remaining = self.state.member_count(),
                    "Member left"
                );
            }
            Departure::Pending => {
                debug!(
                    target: "rc.actor.room",
                    room_id = %self.room_id,
                    connection_id = %conn,
                    "Pending requester left"
                );
            }
            Departure::Unknown => {}
        }
    }

    fn expire_pending(&mut self) {
        let decision = admission::expire(&mut self.state, &self.policy, Instant::now());
        if decision.outcome > 0 {
            info!(
                target: "rc.actor.room",
                room_id = %self.room_id,
                expired = decision.outcome,
                "Pending entry requests timed out"
            );
            for _ in 0..decision.outcome {
                prom::record_admission("denied");
            }
        }
        self.apply(decision);
    }

    /// Deliver a decision's events, then release its routes.
    fn apply<T>(&mut self, decision: Decision<T>) {
        self.relay.deliver_all(&self.state, decision.outbound);
        for conn in decision.release {
            self.relay.release(conn, "released");
        }
    }

    /// Departures for connection actors that stopped on their own.
    async fn check_connection_health(&mut self) {
        for conn in self.relay.reap_finished().await {
            self.handle_departure(conn);
        }
    }

    /// Close the mailbox and answer anything still queued.
    fn reclaim(&mut self) {
        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            "Room empty, reclaiming"
        );
        self.drain_mailbox(|| RcError::RoomClosed);
    }

    fn drain_mailbox(&mut self, join_error: fn() -> RcError) {
        self.receiver.close();
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                RoomMessage::Join { respond_to, .. } => {
                    let _ = respond_to.send(Err(join_error()));
                }
                RoomMessage::GetSnapshot { respond_to } => {
                    let _ = respond_to.send(self.state.snapshot());
                }
                RoomMessage::RespondEntry { .. }
                | RoomMessage::MediaToggle { .. }
                | RoomMessage::Chat { .. }
                | RoomMessage::ConnectionDisconnected { .. } => {}
            }
        }
    }

    async fn graceful_shutdown(&mut self) {
        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            members = self.state.member_count(),
            connections = self.relay.route_count(),
            "Performing graceful shutdown"
        );

        self.drain_mailbox(|| RcError::Draining);
        self.relay.shutdown(CONNECTION_SHUTDOWN_WAIT).await;

        info!(
            target: "rc.actor.room",
            room_id = %self.room_id,
            "Graceful shutdown complete"
        );
    }
}
