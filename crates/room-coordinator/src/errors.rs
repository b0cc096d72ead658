//! Room Coordinator error types.
//!
//! Error types map to signaling `error` event codes for client responses.
//! Internal details are logged server-side but not exposed to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Room Coordinator error type.
///
/// Maps to signaling error codes:
/// - `Protocol`, `NotJoined`: `INVALID_REQUEST` (1)
/// - `PermissionDenied`: `FORBIDDEN` (3)
/// - `RoomNotFound`: `NOT_FOUND` (4)
/// - `Conflict`: `CONFLICT` (5)
/// - `Internal`, `Config`, `RoomClosed`: `INTERNAL_ERROR` (6)
/// - `RoomFull`, `CapacityExceeded`, `Draining`: `CAPACITY_EXCEEDED` (7)
#[derive(Debug, Error)]
pub enum RcError {
    /// Room does not exist (diagnostic lookups only; joins create rooms).
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Room actor was reclaimed while a request was queued.
    ///
    /// Sessions retry against a freshly created room.
    #[error("Room closed")]
    RoomClosed,

    /// Room has reached its participant limit.
    #[error("Room at capacity: {0}")]
    RoomFull(String),

    /// Coordinator has reached its room limit.
    #[error("Coordinator at capacity")]
    CapacityExceeded,

    /// Coordinator is draining (graceful shutdown).
    #[error("Coordinator is draining")]
    Draining,

    /// Conflicting request (e.g., connection already attached).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller lacks the role required for the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Room-scoped message sent before `join-room`.
    #[error("Not joined to a room")]
    NotJoined,

    /// Malformed or invalid client message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RcError {
    /// Returns the signaling error code for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            RcError::Protocol(_) | RcError::NotJoined => 1, // INVALID_REQUEST
            RcError::PermissionDenied(_) => 3,              // FORBIDDEN
            RcError::RoomNotFound(_) => 4,                  // NOT_FOUND
            RcError::Conflict(_) => 5,                      // CONFLICT
            RcError::Internal(_) | RcError::Config(_) | RcError::RoomClosed => 6, // INTERNAL_ERROR
            RcError::RoomFull(_) | RcError::CapacityExceeded | RcError::Draining => 7, // CAPACITY_EXCEEDED
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            RcError::Internal(_) | RcError::Config(_) | RcError::RoomClosed => {
                "An internal error occurred".to_string()
            }
            RcError::RoomNotFound(_) => "Room not found".to_string(),
            RcError::RoomFull(_) => "Room is full".to_string(),
            RcError::CapacityExceeded => "Server is at capacity, please try again".to_string(),
            RcError::Draining => "Server is shutting down, please reconnect".to_string(),
            RcError::NotJoined => "Join a room first".to_string(),
            RcError::Protocol(msg) | RcError::Conflict(msg) | RcError::PermissionDenied(msg) => {
                msg.clone()
            }
        }
    }

    /// HTTP status for the diagnostic endpoints.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            RcError::Protocol(_) | RcError::NotJoined => StatusCode::BAD_REQUEST,
            RcError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            RcError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            RcError::Conflict(_) => StatusCode::CONFLICT,
            RcError::Internal(_) | RcError::Config(_) | RcError::RoomClosed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RcError::RoomFull(_) | RcError::CapacityExceeded | RcError::Draining => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: i32,
    message: String,
}

impl IntoResponse for RcError {
    fn into_response(self) -> Response {
        if let RcError::Internal(detail) = &self {
            tracing::error!(target: "rc.errors", error = %detail, "Request failed");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code(),
                message: self.client_message(),
            },
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(RcError::Protocol("bad json".to_string()).error_code(), 1);
        assert_eq!(RcError::NotJoined.error_code(), 1);
        assert_eq!(
            RcError::PermissionDenied("not host".to_string()).error_code(),
            3
        );
        assert_eq!(RcError::RoomNotFound("room-1".to_string()).error_code(), 4);
        assert_eq!(RcError::Conflict("attached".to_string()).error_code(), 5);
        assert_eq!(RcError::Internal("boom".to_string()).error_code(), 6);
        assert_eq!(RcError::RoomClosed.error_code(), 6);
        assert_eq!(RcError::RoomFull("max 50".to_string()).error_code(), 7);
        assert_eq!(RcError::CapacityExceeded.error_code(), 7);
        assert_eq!(RcError::Draining.error_code(), 7);
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let internal = RcError::Internal("channel send failed: 10.0.0.7".to_string());
        assert!(!internal.client_message().contains("10.0.0.7"));
        assert_eq!(internal.client_message(), "An internal error occurred");

        let config_err = RcError::Config("RC_MAX_ROOMS=abc".to_string());
        assert!(!config_err.client_message().contains("RC_MAX_ROOMS"));

        let full = RcError::RoomFull("room-42 has 50 members".to_string());
        assert_eq!(full.client_message(), "Room is full");
    }

    #[test]
    fn test_protocol_message_passes_through() {
        let err = RcError::Protocol("Chat message exceeds 2000 characters".to_string());
        assert_eq!(err.client_message(), "Chat message exceeds 2000 characters");
    }

    #[tokio::test]
    async fn test_into_response_hides_details() {
        let response = RcError::RoomNotFound("standup".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = RcError::Internal("mailbox closed".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], 6);
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", RcError::RoomNotFound("standup".to_string())),
            "Room not found: standup"
        );
        assert_eq!(format!("{}", RcError::Draining), "Coordinator is draining");
    }
}
