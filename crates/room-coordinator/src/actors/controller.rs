//! `RoomControllerActor` - singleton supervisor for room actors.
//!
//! The `RoomControllerActor` is the top-level actor in the hierarchy:
//!
//! - Singleton per coordinator instance
//! - Owns the map from `RoomId` to live `RoomActor`
//! - Creates a room on the first join attempt for an unseen id
//! - Replaces rooms that reclaimed themselves
//! - Owns the root `CancellationToken` for graceful shutdown
//! - Monitors child actor health (panic detection via `JoinHandle`)
//!
//! # Graceful Shutdown
//!
//! On SIGTERM, the controller:
//! 1. Sets `accepting_new = false` so new rooms are refused with `Draining`
//! 2. Cancels each room and waits, up to the caller's deadline, for the room
//!    actors to close their connections
//! 3. Cancels the root `CancellationToken`

use crate::admission::AdmissionPolicy;
use crate::errors::RcError;

use super::messages::{ControllerMessage, ControllerStatus};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::room::{RoomActor, RoomActorHandle};

use common::types::RoomId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the controller mailbox.
const CONTROLLER_CHANNEL_BUFFER: usize = 1000;

/// How often closed room actors are retired and their tasks joined.
const ROOM_HEALTH_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on waiting for each room during shutdown.
const ROOM_SHUTDOWN_WAIT: Duration = Duration::from_secs(30);

/// Handle to the `RoomControllerActor`.
///
/// This is the public interface for interacting with the controller.
/// All methods are async and return results via oneshot channels.
#[derive(Clone, Debug)]
pub struct RoomControllerActorHandle {
    sender: mpsc::Sender<ControllerMessage>,
    cancel_token: CancellationToken,
}

impl RoomControllerActorHandle {
    /// Create a new `RoomControllerActor` and return a handle to it.
    ///
    /// This spawns the actor task and returns immediately. At most
    /// `max_rooms` rooms are live at once; every room uses `policy`.
    #[must_use]
    pub fn new(
        instance_id: String,
        policy: AdmissionPolicy,
        max_rooms: usize,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(CONTROLLER_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RoomControllerActor::new(
            instance_id,
            receiver,
            cancel_token.clone(),
            policy,
            max_rooms,
            metrics,
        );

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Return the room for `room_id`, creating it if needed.
    ///
    /// # Errors
    ///
    /// `Draining` during shutdown, `CapacityExceeded` past `max_rooms`.
    pub async fn get_or_create_room(&self, room_id: RoomId) -> Result<RoomActorHandle, RcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(ControllerMessage::GetOrCreateRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Return the room for `room_id` only if it is live.
    ///
    /// # Errors
    ///
    /// `RoomNotFound` if no live room has that id.
    pub async fn get_room(&self, room_id: RoomId) -> Result<RoomActorHandle, RcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(ControllerMessage::GetRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))?
    }

    /// # Errors
    ///
    /// `RcError::Internal` if the controller has exited.
    pub async fn get_status(&self) -> Result<ControllerStatus, RcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(ControllerMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))
    }

    /// Drain all rooms and stop the actor system.
    ///
    /// Resolves once every room has closed its connections or `deadline`
    /// has elapsed.
    ///
    /// # Errors
    ///
    /// `RcError::Internal` if the controller has exited or rooms were still
    /// draining at the deadline.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), RcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(ControllerMessage::Shutdown {
                deadline,
                respond_to: tx,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for spawning child actors.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// Internal state for a managed room.
struct ManagedRoom {
    handle: RoomActorHandle,
    task_handle: JoinHandle<()>,
}

/// The `RoomControllerActor` implementation.
pub struct RoomControllerActor {
    instance_id: String,
    receiver: mpsc::Receiver<ControllerMessage>,
    /// Root cancellation token.
    cancel_token: CancellationToken,
    rooms: HashMap<RoomId, ManagedRoom>,
    /// Closed rooms whose tasks have not been joined yet.
    retiring: Vec<(RoomId, JoinHandle<()>)>,
    policy: AdmissionPolicy,
    max_rooms: usize,
    /// False once shutdown has begun.
    accepting_new: bool,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl RoomControllerActor {
    fn new(
        instance_id: String,
        receiver: mpsc::Receiver<ControllerMessage>,
        cancel_token: CancellationToken,
        policy: AdmissionPolicy,
        max_rooms: usize,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let mailbox = MailboxMonitor::new(ActorType::Controller, instance_id.as_str());

        Self {
            instance_id,
            receiver,
            cancel_token,
            rooms: HashMap::new(),
            retiring: Vec::new(),
            policy,
            max_rooms,
            accepting_new: true,
            metrics,
            mailbox,
        }
    }

    #[instrument(skip_all, name = "rc.actor.controller", fields(instance_id = %self.instance_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            max_rooms = self.max_rooms,
            "RoomControllerActor started"
        );

        let mut health_check = tokio::time::interval(ROOM_HEALTH_INTERVAL);
        health_check.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.controller",
                        instance_id = %self.instance_id,
                        "RoomControllerActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                _ = health_check.tick() => {
                    self.check_room_health().await;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_receive(self.receiver.len());
                            self.handle_message(message).await;
                            self.mailbox.record_handled(self.receiver.len());
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "rc.actor.controller",
                                instance_id = %self.instance_id,
                                "RoomControllerActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            rooms_remaining = self.rooms.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomControllerActor stopped"
        );
    }

    async fn handle_message(&mut self, message: ControllerMessage) {
        match message {
            ControllerMessage::GetOrCreateRoom {
                room_id,
                respond_to,
            } => {
                let result = self.get_or_create_room(room_id);
                let _ = respond_to.send(result);
            }

            ControllerMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let result = self.get_room(&room_id);
                let _ = respond_to.send(result);
            }

            ControllerMessage::GetStatus { respond_to } => {
                self.retire_closed_rooms();
                let _ = respond_to.send(self.get_status());
            }

            ControllerMessage::Shutdown {
                deadline,
                respond_to,
            } => {
                let result = self.initiate_shutdown(deadline).await;
                let _ = respond_to.send(result);
            }
        }
    }

    fn get_or_create_room(&mut self, room_id: RoomId) -> Result<RoomActorHandle, RcError> {
        if !self.accepting_new {
            return Err(RcError::Draining);
        }

        // Reclaimed rooms stop counting against the limit as soon as they
        // close, not at the next health sweep.
        self.retire_closed_rooms();

        if let Some(managed) = self.rooms.get(&room_id) {
            return Ok(managed.handle.clone());
        }

        if self.rooms.len() >= self.max_rooms {
            warn!(
                target: "rc.actor.controller",
                instance_id = %self.instance_id,
                max_rooms = self.max_rooms,
                "Room limit reached, refusing new room"
            );
            return Err(RcError::CapacityExceeded);
        }

        let (handle, task_handle) = RoomActor::spawn(
            room_id.clone(),
            self.policy,
            self.cancel_token.child_token(),
            Arc::clone(&self.metrics),
        );

        self.rooms.insert(
            room_id.clone(),
            ManagedRoom {
                handle: handle.clone(),
                task_handle,
            },
        );
        self.metrics.room_created();

        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            room_id = %room_id,
            total_rooms = self.rooms.len(),
            "Room actor created"
        );

        Ok(handle)
    }

    fn get_room(&self, room_id: &RoomId) -> Result<RoomActorHandle, RcError> {
        match self.rooms.get(room_id) {
            Some(managed) if !managed.handle.is_closed() => Ok(managed.handle.clone()),
            _ => Err(RcError::RoomNotFound(room_id.to_string())),
        }
    }

    fn get_status(&self) -> ControllerStatus {
        ControllerStatus {
            room_count: self.rooms.len(),
            connection_count: self.metrics.connection_count(),
            is_draining: !self.accepting_new,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    /// Drain every room within `deadline`, then cancel the root token.
    async fn initiate_shutdown(&mut self, deadline: Duration) -> Result<(), RcError> {
        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            room_count = self.rooms.len(),
            deadline_secs = deadline.as_secs(),
            "Initiating graceful shutdown"
        );

        self.accepting_new = false;
        let drained = tokio::time::timeout(deadline, self.drain_rooms()).await;
        self.cancel_token.cancel();

        if drained.is_err() {
            warn!(
                target: "rc.actor.controller",
                instance_id = %self.instance_id,
                rooms_remaining = self.rooms.len(),
                "Shutdown deadline elapsed before all rooms drained"
            );
            return Err(RcError::Internal(format!(
                "{} rooms still draining at shutdown deadline",
                self.rooms.len()
            )));
        }

        Ok(())
    }

    async fn graceful_shutdown(&mut self) {
        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            room_count = self.rooms.len(),
            "Performing graceful shutdown"
        );

        self.accepting_new = false;
        self.drain_rooms().await;

        info!(
            target: "rc.actor.controller",
            instance_id = %self.instance_id,
            "Graceful shutdown complete"
        );
    }

    /// Cancel every room and wait for each actor to close its connections.
    async fn drain_rooms(&mut self) {
        for managed in self.rooms.values() {
            managed.handle.cancel();
        }

        let room_ids: Vec<RoomId> = self.rooms.keys().cloned().collect();
        for room_id in room_ids {
            let Some(managed) = self.rooms.remove(&room_id) else {
                continue;
            };
            match tokio::time::timeout(ROOM_SHUTDOWN_WAIT, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        "Room actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        error = ?e,
                        "Room actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        "Room actor shutdown timed out"
                    );
                }
            }
            self.metrics.room_removed();
        }

        for (room_id, task_handle) in std::mem::take(&mut self.retiring) {
            if tokio::time::timeout(ROOM_SHUTDOWN_WAIT, task_handle)
                .await
                .is_err()
            {
                warn!(
                    target: "rc.actor.controller",
                    instance_id = %self.instance_id,
                    room_id = %room_id,
                    "Retiring room actor shutdown timed out"
                );
            }
        }
    }

    /// Move closed rooms out of the live map.
    ///
    /// A room's mailbox closes when it reclaims itself or its task dies, so
    /// this runs before every lookup. The task is joined later by
    /// `check_room_health`.
    fn retire_closed_rooms(&mut self) {
        let closed: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, managed)| managed.handle.is_closed())
            .map(|(room_id, _)| room_id.clone())
            .collect();

        for room_id in closed {
            let Some(managed) = self.rooms.remove(&room_id) else {
                continue;
            };
            debug!(
                target: "rc.actor.controller",
                instance_id = %self.instance_id,
                room_id = %room_id,
                "Retiring closed room actor"
            );
            self.metrics.room_removed();
            self.retiring.push((room_id, managed.task_handle));
        }
    }

    /// Join room actors that exited, whether reclaimed or panicked.
    async fn check_room_health(&mut self) {
        self.retire_closed_rooms();

        let (finished, still_running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retiring)
            .into_iter()
            .partition(|(_, task_handle)| task_handle.is_finished());
        self.retiring = still_running;

        for (room_id, task_handle) in finished {
            match task_handle.await {
                Ok(()) => {
                    debug!(
                        target: "rc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        "Room actor exited cleanly"
                    );
                }
                Err(join_error) if join_error.is_panic() => {
                    error!(
                        target: "rc.actor.controller",
                        instance_id = %self.instance_id,
                        room_id = %room_id,
                        error = ?join_error,
                        "Room actor panicked - triggering investigation"
                    );
                    self.metrics.record_panic(ActorType::Room);
                }
                Err(_) => {}
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::admission::{JoinOutcome, JoinRequest};
    use common::types::{ConnectionId, MediaId};

    fn controller(max_rooms: usize) -> (RoomControllerActorHandle, Arc<ActorMetrics>) {
        let metrics = ActorMetrics::new();
        let handle = RoomControllerActorHandle::new(
            "rc-test".to_string(),
            AdmissionPolicy::default(),
            max_rooms,
            Arc::clone(&metrics),
        );
        (handle, metrics)
    }

    fn room(id: &str) -> RoomId {
        RoomId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_room() {
        let (handle, metrics) = controller(10);

        let first = handle.get_or_create_room(room("standup")).await.unwrap();
        let second = handle.get_or_create_room(room("standup")).await.unwrap();
        assert_eq!(first.room_id(), second.room_id());

        let status = handle.get_status().await.unwrap();
        assert_eq!(status.room_count, 1);
        assert_eq!(metrics.room_count(), 1);
        assert!(!status.is_draining);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_get_room_does_not_create() {
        let (handle, _metrics) = controller(10);

        let result = handle.get_room(room("nobody-here")).await;
        assert!(matches!(result, Err(RcError::RoomNotFound(_))));

        handle.get_or_create_room(room("somebody")).await.unwrap();
        assert!(handle.get_room(room("somebody")).await.is_ok());

        handle.cancel();
    }

    #[tokio::test]
    async fn test_room_limit() {
        let (handle, _metrics) = controller(2);

        handle.get_or_create_room(room("a")).await.unwrap();
        handle.get_or_create_room(room("b")).await.unwrap();
        let result = handle.get_or_create_room(room("c")).await;
        assert!(matches!(result, Err(RcError::CapacityExceeded)));

        // Existing rooms are still reachable at the limit.
        assert!(handle.get_or_create_room(room("a")).await.is_ok());

        handle.cancel();
    }

    #[tokio::test]
    async fn test_reclaimed_room_is_replaced() {
        let (handle, _metrics) = controller(10);
        let (tx, _rx) = mpsc::channel(8);
        let conn = ConnectionId::new();

        let first = handle.get_or_create_room(room("reused")).await.unwrap();
        let outcome = first
            .join(
                JoinRequest {
                    connection_id: conn,
                    name: "solo".to_string(),
                    media_id: MediaId::parse("media-solo").unwrap(),
                    is_host: false,
                },
                tx.clone(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, JoinOutcome::Granted);

        first.connection_disconnected(conn).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !first.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let second = handle.get_or_create_room(room("reused")).await.unwrap();
        assert!(!second.is_closed());
        assert_eq!(second.get_snapshot().await.unwrap().members.len(), 0);

        handle.cancel();
    }

    async fn reclaim(handle: &RoomActorHandle) {
        let (tx, _rx) = mpsc::channel(8);
        let conn = ConnectionId::new();
        handle
            .join(
                JoinRequest {
                    connection_id: conn,
                    name: "passing".to_string(),
                    media_id: MediaId::parse("media-passing").unwrap(),
                    is_host: false,
                },
                tx,
            )
            .await
            .unwrap();
        handle.connection_disconnected(conn).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !handle.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_reclaimed_room_frees_its_slot_before_sweep() {
        let (handle, metrics) = controller(1);

        // Let the first health tick pass so the next sweep is seconds away.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let first = handle.get_or_create_room(room("a")).await.unwrap();
        reclaim(&first).await;

        let second = handle.get_or_create_room(room("b")).await.unwrap();
        assert!(!second.is_closed());
        assert_eq!(metrics.room_count(), 1);
        assert_eq!(handle.get_status().await.unwrap().room_count, 1);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_status_excludes_reclaimed_rooms() {
        let (handle, metrics) = controller(10);
        let live = handle.get_or_create_room(room("live")).await.unwrap();
        let gone = handle.get_or_create_room(room("gone")).await.unwrap();
        reclaim(&gone).await;

        assert_eq!(handle.get_status().await.unwrap().room_count, 1);
        assert_eq!(metrics.room_count(), 1);
        assert!(matches!(
            handle.get_room(room("gone")).await,
            Err(RcError::RoomNotFound(_))
        ));
        assert!(!live.is_closed());

        handle.cancel();
    }

    #[tokio::test]
    async fn test_status_reports_queued_backlog() {
        let (handle, _metrics) = controller(10);

        // All requests are queued before the controller runs again.
        let statuses =
            futures_util::future::join_all((0..20).map(|_| handle.get_status())).await;
        let deepest = statuses
            .iter()
            .map(|status| status.as_ref().unwrap().mailbox_depth)
            .max()
            .unwrap();
        assert!(deepest > 1, "backlog never observed: {deepest}");

        // Alone in the mailbox, a request only sees itself.
        assert_eq!(handle.get_status().await.unwrap().mailbox_depth, 1);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_rooms() {
        let (handle, _metrics) = controller(10);
        let existing = handle.get_or_create_room(room("live")).await.unwrap();

        handle.shutdown(Duration::from_secs(30)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(handle.is_cancelled());
        assert!(existing.is_cancelled());
    }

    #[tokio::test]
    async fn test_controller_cancellation_token() {
        let (handle, _metrics) = controller(10);

        let child = handle.child_token();
        assert!(!child.is_cancelled());

        handle.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(handle.is_cancelled());
        assert!(child.is_cancelled());
    }
}
