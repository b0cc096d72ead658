//! Actor hierarchy for the Room Coordinator.
//!
//! ```text
//! RoomControllerActor (singleton)
//! └── RoomActor (one per active room, owns RoomState and the relay)
//!     └── ConnectionActor (one per admitted or pending connection)
//! ```
//!
//! Every actor is a tokio task with an `mpsc` mailbox, reached through a
//! cloneable handle. Requests that need an answer carry a `oneshot` reply.
//! Cancellation flows down the `CancellationToken` parent/child chain.

pub mod connection;
pub mod controller;
pub mod messages;
pub mod metrics;
pub mod room;

pub use connection::{ConnectionActor, ConnectionActorHandle};
pub use controller::{RoomControllerActor, RoomControllerActorHandle};
pub use messages::{ConnectionMessage, ControllerMessage, ControllerStatus, RoomMessage};
pub use metrics::{ActorMetrics, ActorType, MailboxLevel, MailboxMonitor};
pub use room::{RoomActor, RoomActorHandle};
