//! Room Coordinator Library
//!
//! Server-side coordinator for multi-party WebRTC rooms. Browsers form a full
//! mesh of direct media links; this service decides who is in each room and
//! tells every member about the others:
//!
//! - Room membership, host identity and host-gated entry
//! - Scoped relay of peer, host, media-state and chat events
//! - JSON signaling over one WebSocket per participant
//! - Graceful shutdown that drains rooms and closes connections
//!
//! # Architecture
//!
//! ```text
//! RoomControllerActor (singleton per instance)
//! └── supervises N RoomActors
//!     └── RoomActor (one per active room)
//!         ├── owns RoomState (host, members, pending entry requests)
//!         └── supervises N ConnectionActors
//!             └── ConnectionActor (one per admitted or pending socket)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Sequential rooms**: every mutation of a room is a message handled in
//!   order by its actor, so all members observe one history
//! - **Pure admission**: [`admission`] decides and returns events; the room
//!   actor applies them through the [`relay`]
//! - **Last claim wins**: a new host claim replaces the current host
//! - **Non-blocking fan-out**: a slow client loses events, never stalls a room
//!
//! # Modules
//!
//! - [`actors`] - Actor hierarchy
//! - [`admission`] - Entry decisions and host departure handling
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with signaling error codes
//! - [`observability`] - Metrics and health endpoints
//! - [`registry`] - Per-room membership state
//! - [`relay`] - Audience resolution and delivery
//! - [`signaling`] - HTTP routes, WebSocket sessions and the wire protocol

pub mod actors;
pub mod admission;
pub mod config;
pub mod errors;
pub mod observability;
pub mod registry;
pub mod relay;
pub mod signaling;
