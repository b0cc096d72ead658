//! Observability for the Room Coordinator: Prometheus metrics and the
//! liveness/readiness endpoints.

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
