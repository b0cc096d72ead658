//! Room Coordinator
//!
//! Room membership and signaling relay for browser-to-browser WebRTC rooms.
//!
//! # Servers
//!
//! The Room Coordinator runs two servers:
//! - HTTP + WebSocket server for client signaling (default: 0.0.0.0:3000)
//! - HTTP server for health endpoints and metrics (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Initialize tracing from `RUST_LOG` and `RC_LOG_FORMAT`
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Initialize actor system (`RoomControllerActorHandle`)
//! 5. Start health HTTP server (liveness, readiness, metrics)
//! 6. Start signaling server and mark ready
//! 7. Wait for shutdown signal, then drain rooms

#![warn(clippy::pedantic)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use common::config::{LogFormat, ObservabilityConfig};
use room_coordinator::actors::{ActorMetrics, RoomControllerActorHandle};
use room_coordinator::config::Config;
use room_coordinator::observability::metrics::init_metrics_recorder;
use room_coordinator::observability::{health_router, HealthState};
use room_coordinator::signaling::{build_routes, AppState, SessionSettings};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time given to in-flight HTTP work after the shutdown token fires.
const SERVER_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Deadline for draining every room during shutdown.
const ACTOR_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_vars: HashMap<String, String> = std::env::vars().collect();
    init_tracing(&ObservabilityConfig::from_vars(&env_vars, "RC"));

    info!("Starting Room Coordinator");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        instance_id = %config.instance_id,
        signaling_bind_address = %config.signaling_bind_address,
        health_bind_address = %config.health_bind_address,
        hostless_policy = ?config.hostless_policy,
        host_departure_policy = ?config.host_departure_policy,
        pending_entry_timeout_secs = config.pending_entry_timeout.map(|t| t.as_secs()),
        max_rooms = config.max_rooms,
        max_participants_per_room = config.max_participants_per_room,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());

    let controller_handle = RoomControllerActorHandle::new(
        config.instance_id.clone(),
        config.admission_policy(),
        config.max_rooms,
        ActorMetrics::new(),
    );
    info!("Actor system initialized");

    // Child of the controller token so servers stop with the actor system
    let shutdown_token = controller_handle.child_token();

    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let health_app = health_router(Arc::clone(&health_state)).merge(metrics_router);

    // Bind listeners BEFORE spawning to fail fast on bind errors
    let health_listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let health_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(health_listener, health_app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    let signaling_addr: SocketAddr = config.signaling_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.signaling_bind_address, "Invalid signaling bind address");
        format!("Invalid signaling bind address: {e}")
    })?;

    let signaling_listener = tokio::net::TcpListener::bind(signaling_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %signaling_addr, "Failed to bind signaling server");
            format!("Failed to bind signaling server to {signaling_addr}: {e}")
        })?;

    let app_state = Arc::new(AppState {
        controller: controller_handle.clone(),
        settings: SessionSettings::from_config(&config),
    });
    let signaling_app = build_routes(app_state);

    let signaling_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %signaling_addr, "Signaling server starting");
        let server = axum::serve(signaling_listener, signaling_app).with_graceful_shutdown(
            async move {
                signaling_shutdown_token.cancelled().await;
                info!("Signaling server shutting down");
            },
        );
        if let Err(e) = server.await {
            error!(error = %e, "Signaling server failed");
        }
    });

    health_state.set_ready();
    info!("Room Coordinator running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so the load balancer stops routing here
    health_state.set_not_ready();

    // Drain rooms first so every participant receives its final events
    // before the servers stop accepting frames.
    if let Err(e) = controller_handle.shutdown(ACTOR_SHUTDOWN_DEADLINE).await {
        warn!(error = %e, "Actor system shutdown error");
    }

    shutdown_token.cancel();
    tokio::time::sleep(SERVER_SHUTDOWN_GRACE).await;

    info!("Room Coordinator shutdown complete");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
fn init_tracing(observability: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| observability.log_filter.as_str().into());

    let json = observability.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Without them the service
/// cannot shut down gracefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
