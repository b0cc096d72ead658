//! Common utilities and types shared across Huddle components.

#![warn(clippy::pedantic)]

/// Module for common error types
pub mod error;

/// Module for identifier types (rooms, connections, media endpoints)
pub mod types;

/// Module for common configuration
pub mod config;
