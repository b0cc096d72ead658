//! HTTP and WebSocket signaling surface.
//!
//! Routes:
//! - `GET /rooms/new` - generate a fresh room id
//! - `GET /rooms/:room_id` - diagnostic summary of a live room
//! - `GET /rooms/:room_id/ws` - signaling WebSocket (one session per socket)

pub mod protocol;
pub mod session;

use crate::actors::RoomControllerActorHandle;
use crate::config::Config;
use crate::errors::RcError;

use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use axum::{routing::get, Json, Router};
use common::types::RoomId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, instrument};

/// Per-socket limits taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub max_chat_length: usize,
    pub max_message_size: usize,
    pub idle_timeout: Duration,
}

impl SessionSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_chat_length: config.max_chat_length,
            max_message_size: config.max_message_size,
            idle_timeout: config.idle_timeout,
        }
    }

    /// How often the server pings an otherwise quiet socket.
    ///
    /// A third of the idle timeout, so two pongs can go missing before the
    /// read side gives up on the peer.
    #[must_use]
    pub fn keepalive_interval(&self) -> Duration {
        (self.idle_timeout / 3).max(MIN_KEEPALIVE_INTERVAL)
    }
}

/// Floor for the keepalive period when the idle timeout is very short.
const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(50);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: RoomControllerActorHandle,
    pub settings: SessionSettings,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoomResponse {
    pub room_id: RoomId,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub host_present: bool,
    pub member_count: usize,
    pub pending_count: usize,
}

/// Build the signaling routes with request tracing.
pub fn build_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rooms/new", get(new_room))
        .route("/rooms/:room_id", get(room_summary))
        .route("/rooms/:room_id/ws", get(room_socket))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn new_room() -> Json<NewRoomResponse> {
    Json(NewRoomResponse {
        room_id: RoomId::generate(),
    })
}

#[instrument(skip_all, name = "rc.signaling.summary", fields(room_id = %raw_id))]
async fn room_summary(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<RoomSummary>, RcError> {
    let room_id = parse_room_id(&raw_id)?;
    let room = state.controller.get_room(room_id.clone()).await?;
    let snapshot = room
        .get_snapshot()
        .await
        .map_err(|_| RcError::RoomNotFound(room_id.to_string()))?;

    Ok(Json(RoomSummary {
        room_id,
        host_present: snapshot.host.is_some(),
        member_count: snapshot.members.len(),
        pending_count: snapshot.pending.len(),
    }))
}

async fn room_socket(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, RcError> {
    let room_id = parse_room_id(&raw_id)?;
    let limit = state.settings.max_message_size;

    Ok(ws
        .max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| session::run_session(socket, room_id, state)))
}

fn parse_room_id(raw: &str) -> Result<RoomId, RcError> {
    RoomId::parse(raw).map_err(|e| {
        debug!(target: "rc.signaling", error = %e, "Rejected room id");
        RcError::Protocol(format!("Invalid room id: {e}"))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::actors::ActorMetrics;
    use crate::admission::{AdmissionPolicy, JoinRequest};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use common::types::{ConnectionId, MediaId};
    use http_body_util::BodyExt;
    use tokio::sync::mpsc;
    use tower::util::ServiceExt;

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState {
            controller: RoomControllerActorHandle::new(
                "rc-routes-test".to_string(),
                AdmissionPolicy::default(),
                10,
                ActorMetrics::new(),
            ),
            settings: SessionSettings {
                max_chat_length: 2000,
                max_message_size: 65536,
                idle_timeout: Duration::from_secs(300),
            },
        })
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_keepalive_interval_is_inside_idle_timeout() {
        let settings = app_state().settings;
        assert_eq!(settings.keepalive_interval(), Duration::from_secs(100));

        let short = SessionSettings {
            idle_timeout: Duration::from_millis(30),
            ..settings
        };
        assert_eq!(short.keepalive_interval(), MIN_KEEPALIVE_INTERVAL);
    }

    #[tokio::test]
    async fn test_new_room_returns_uuid() {
        let app = build_routes(app_state());
        let (status, body) = get(app, "/rooms/new").await;

        assert_eq!(status, StatusCode::OK);
        let room_id = body["roomId"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(room_id).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_room_is_404_and_invalid_id_is_400() {
        let app = build_routes(app_state());

        let (status, body) = get(app.clone(), "/rooms/nobody-home").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], 4);

        let (status, _) = get(app, "/rooms/has.dots").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_room_summary_reflects_members() {
        let state = app_state();
        let room = state
            .controller
            .get_or_create_room(RoomId::parse("daily").unwrap())
            .await
            .unwrap();
        let (tx, _rx) = mpsc::channel(8);
        room.join(
            JoinRequest {
                connection_id: ConnectionId::new(),
                name: "Ada".to_string(),
                media_id: MediaId::parse("media-ada").unwrap(),
                is_host: true,
            },
            tx,
        )
        .await
        .unwrap();

        let (status, body) = get(build_routes(Arc::clone(&state)), "/rooms/daily").await;
        assert_eq!(status, StatusCode::OK);
        let summary: RoomSummary = serde_json::from_value(body).unwrap();
        assert_eq!(
            summary,
            RoomSummary {
                room_id: RoomId::parse("daily").unwrap(),
                host_present: true,
                member_count: 1,
                pending_count: 0,
            }
        );

        state.controller.cancel();
    }
}
