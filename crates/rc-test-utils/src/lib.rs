//! # RC Test Utilities
//!
//! Shared test utilities for the Room Coordinator (RC) service.
//!
//! This crate depends only on `common`, so both the coordinator's unit tests
//! and its integration tests can use it without pulling in a second copy of
//! the coordinator crate.
//!
//! ## Modules
//!
//! - `fixtures` - Participants and room ids with sensible defaults
//! - `event_probe` - Timed assertions over an in-process event channel
//! - `ws_client` - JSON WebSocket client for end-to-end signaling tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let host = TestParticipant::host("Ada");
//!     let (outbound, mut probe) = EventProbe::channel(32);
//!
//!     // Hand `outbound` to the room, then assert on what arrives
//!     let event = probe.expect_event("entry-granted").await;
//!     probe.expect_silence().await;
//! }
//! ```

pub mod event_probe;
pub mod fixtures;
pub mod ws_client;

// Re-export commonly used items
pub use event_probe::*;
pub use fixtures::*;
pub use ws_client::*;
