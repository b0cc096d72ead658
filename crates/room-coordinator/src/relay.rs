//! Signaling relay: scoped delivery of room events.
//!
//! The relay owns the room's route table (connection id to
//! `ConnectionActorHandle`). Audiences resolve against `RoomState` at send
//! time, so `Audience::Room` only ever reaches admitted members while
//! `Audience::One` can address a pending requester.
//!
//! Delivery never waits: a full or closed connection mailbox is logged and
//! counted, and the rest of the audience still gets the event.

use crate::actors::connection::ConnectionActorHandle;
use crate::actors::metrics::{ActorMetrics, ActorType};
use crate::observability::metrics as prom;
use crate::registry::RoomState;
use crate::signaling::protocol::ServerEvent;

use common::types::{ConnectionId, RoomId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Who an event is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every member, optionally minus one (usually the sender).
    Room { except: Option<ConnectionId> },
    /// A single connection, member or pending.
    One(ConnectionId),
}

/// An event addressed to an audience.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub audience: Audience,
    pub event: ServerEvent,
}

struct Route {
    handle: ConnectionActorHandle,
    task_handle: JoinHandle<()>,
}

/// Route table for one room.
pub struct Relay {
    room_id: RoomId,
    routes: HashMap<ConnectionId, Route>,
    metrics: Arc<ActorMetrics>,
}

impl Relay {
    #[must_use]
    pub fn new(room_id: RoomId, metrics: Arc<ActorMetrics>) -> Self {
        Self {
            room_id,
            routes: HashMap::new(),
            metrics,
        }
    }

    #[must_use]
    pub fn has_route(&self, connection: ConnectionId) -> bool {
        self.routes.contains_key(&connection)
    }

    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Register a freshly spawned connection actor.
    pub fn attach(&mut self, handle: ConnectionActorHandle, task_handle: JoinHandle<()>) {
        let connection = handle.connection_id();
        let previous = self.routes.insert(
            connection,
            Route {
                handle,
                task_handle,
            },
        );
        match previous {
            Some(old) => old.handle.cancel(),
            None => self.metrics.connection_created(),
        }
    }

    /// Deliver one outbound event to its resolved audience.
    pub fn deliver(&self, state: &RoomState, outbound: Outbound) {
        let Outbound { audience, event } = outbound;
        match audience {
            Audience::One(connection) => self.deliver_to(connection, event),
            Audience::Room { except } => {
                for connection in state.member_ids_except(except) {
                    self.deliver_to(connection, event.clone());
                }
            }
        }
    }

    pub fn deliver_all(&self, state: &RoomState, outbound: Vec<Outbound>) {
        for item in outbound {
            self.deliver(state, item);
        }
    }

    fn deliver_to(&self, connection: ConnectionId, event: ServerEvent) {
        let Some(route) = self.routes.get(&connection) else {
            debug!(
                target: "rc.relay",
                room_id = %self.room_id,
                connection_id = %connection,
                event = event.kind(),
                "No route for recipient, event skipped"
            );
            return;
        };

        let kind = event.kind();
        match route.handle.deliver(event) {
            Ok(()) => prom::record_event_relayed(kind),
            Err(e) => {
                warn!(
                    target: "rc.relay",
                    room_id = %self.room_id,
                    connection_id = %connection,
                    event = kind,
                    error = %e,
                    "Event delivery failed"
                );
                prom::record_delivery_failure(if route.task_handle.is_finished() {
                    "closed"
                } else {
                    "full"
                });
            }
        }
    }

    /// Stop routing to `connection` once its queued events are flushed.
    pub fn release(&mut self, connection: ConnectionId, reason: &'static str) {
        if let Some(route) = self.routes.remove(&connection) {
            if route.handle.close(reason).is_err() {
                route.handle.cancel();
            }
            self.metrics.connection_closed();
        }
    }

    /// Drop the route for a connection whose socket is already gone.
    pub fn detach(&mut self, connection: ConnectionId) {
        if let Some(route) = self.routes.remove(&connection) {
            route.handle.cancel();
            self.metrics.connection_closed();
        }
    }

    /// Remove routes whose actor task ended on its own. Returns their ids.
    pub async fn reap_finished(&mut self) -> Vec<ConnectionId> {
        let finished: Vec<ConnectionId> = self
            .routes
            .iter()
            .filter(|(_, route)| route.task_handle.is_finished())
            .map(|(id, _)| *id)
            .collect();

        for connection in &finished {
            let Some(route) = self.routes.remove(connection) else {
                continue;
            };
            self.metrics.connection_closed();
            if let Err(join_error) = route.task_handle.await {
                if join_error.is_panic() {
                    error!(
                        target: "rc.relay",
                        room_id = %self.room_id,
                        connection_id = %connection,
                        error = ?join_error,
                        "Connection actor panicked"
                    );
                    self.metrics.record_panic(ActorType::Connection);
                }
            }
        }

        finished
    }

    /// Cancel every route and wait briefly for the actors to exit.
    pub async fn shutdown(&mut self, wait: std::time::Duration) {
        for route in self.routes.values() {
            route.handle.cancel();
        }
        for (connection, route) in self.routes.drain() {
            self.metrics.connection_closed();
            if tokio::time::timeout(wait, route.task_handle).await.is_err() {
                warn!(
                    target: "rc.relay",
                    room_id = %self.room_id,
                    connection_id = %connection,
                    "Connection actor shutdown timed out"
                );
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::actors::connection::ConnectionActor;
    use common::types::MediaId;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    struct Harness {
        relay: Relay,
        state: RoomState,
        token: CancellationToken,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                relay: Relay::new(RoomId::parse("relay-room").unwrap(), ActorMetrics::new()),
                state: RoomState::new(),
                token: CancellationToken::new(),
            }
        }

        fn connect(&mut self, name: &str, member: bool) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
            let id = ConnectionId::new();
            let (tx, rx) = mpsc::channel(16);
            let (handle, task) = ConnectionActor::spawn(
                id,
                RoomId::parse("relay-room").unwrap(),
                tx,
                self.token.child_token(),
                ActorMetrics::new(),
            );
            self.relay.attach(handle, task);
            let media = MediaId::parse(&format!("media-{name}")).unwrap();
            if member {
                self.state.add_member(id, name, &media, Instant::now());
            } else {
                self.state.add_pending(id, name, &media, None, Instant::now());
            }
            (id, rx)
        }
    }

    fn hostless() -> ServerEvent {
        ServerEvent::HostChanged {
            host_id: None,
            name: None,
        }
    }

    async fn recv(rx: &mut mpsc::Receiver<ServerEvent>) -> Option<ServerEvent> {
        tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_room_audience_skips_sender_and_pending() {
        let mut h = Harness::new();
        let (alice, mut alice_rx) = h.connect("alice", true);
        let (_bob, mut bob_rx) = h.connect("bob", true);
        let (_carol, mut carol_rx) = h.connect("carol", false);

        h.relay.deliver(
            &h.state,
            Outbound {
                audience: Audience::Room { except: Some(alice) },
                event: hostless(),
            },
        );

        assert_eq!(recv(&mut bob_rx).await, Some(hostless()));
        assert_eq!(recv(&mut alice_rx).await, None);
        assert_eq!(recv(&mut carol_rx).await, None, "pending must not see room traffic");

        h.token.cancel();
    }

    #[tokio::test]
    async fn test_one_audience_reaches_pending_requester() {
        let mut h = Harness::new();
        let (carol, mut carol_rx) = h.connect("carol", false);

        h.relay.deliver(
            &h.state,
            Outbound {
                audience: Audience::One(carol),
                event: hostless(),
            },
        );

        assert_eq!(recv(&mut carol_rx).await, Some(hostless()));
        h.token.cancel();
    }

    #[tokio::test]
    async fn test_release_flushes_then_removes_route() {
        let mut h = Harness::new();
        let (carol, mut carol_rx) = h.connect("carol", false);
        let denied = ServerEvent::EntryDenied {
            reason: crate::signaling::protocol::DenyReason::Host,
        };

        h.relay.deliver(
            &h.state,
            Outbound {
                audience: Audience::One(carol),
                event: denied.clone(),
            },
        );
        h.relay.release(carol, "denied");

        assert!(!h.relay.has_route(carol));
        assert_eq!(recv(&mut carol_rx).await, Some(denied));
        assert_eq!(recv(&mut carol_rx).await, None);
    }

    #[tokio::test]
    async fn test_reap_finished_reports_exited_actors() {
        let mut h = Harness::new();
        let (alice, alice_rx) = h.connect("alice", true);
        let (bob, _bob_rx) = h.connect("bob", true);

        // Alice's session is gone; the next delivery stops her actor.
        drop(alice_rx);
        h.relay.deliver(
            &h.state,
            Outbound {
                audience: Audience::One(alice),
                event: hostless(),
            },
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        let reaped = h.relay.reap_finished().await;
        assert_eq!(reaped, vec![alice]);
        assert!(h.relay.has_route(bob));
        assert_eq!(h.relay.route_count(), 1);

        h.relay.shutdown(Duration::from_secs(1)).await;
        assert_eq!(h.relay.route_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_survives_dead_recipient() {
        use metrics_util::debugging::{DebugValue, DebuggingRecorder};

        let mut h = Harness::new();
        let (alice, mut alice_rx) = h.connect("alice", true);
        let (bob, bob_rx) = h.connect("bob", true);
        let (carol, mut carol_rx) = h.connect("carol", true);

        // Bob's actor exits on its next delivery but keeps its route until
        // the room reaps it.
        drop(bob_rx);
        h.relay.deliver(
            &h.state,
            Outbound {
                audience: Audience::One(bob),
                event: hostless(),
            },
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.relay.has_route(bob));

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        metrics::with_local_recorder(&recorder, || {
            h.relay.deliver(
                &h.state,
                Outbound {
                    audience: Audience::Room { except: None },
                    event: hostless(),
                },
            );
        });

        assert_eq!(recv(&mut alice_rx).await, Some(hostless()), "{alice} missed it");
        assert_eq!(recv(&mut carol_rx).await, Some(hostless()), "{carol} missed it");

        let counter = |name: &str, label: &str| {
            snapshotter
                .snapshot()
                .into_vec()
                .into_iter()
                .find(|(key, _, _, _)| {
                    key.key().name() == name && key.key().labels().any(|l| l.value() == label)
                })
                .map(|(_, _, _, value)| value)
        };
        assert!(matches!(
            counter("rc_delivery_failures_total", "closed"),
            Some(DebugValue::Counter(1))
        ));

        h.token.cancel();
    }
}
