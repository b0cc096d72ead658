//! Pre-configured test data fixtures for RC testing.
//!
//! Provides builders and test data for:
//! - Rooms with fresh or fixed ids
//! - Participants joining as host or guest
//! - `join-room` frames for WebSocket tests

use common::types::{MediaId, RoomId};
use serde_json::json;
use uuid::Uuid;

/// Test room fixture.
#[derive(Debug, Clone)]
pub struct TestRoom {
    /// Room ID.
    pub id: RoomId,
}

impl TestRoom {
    /// Create a test room with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a valid room id.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            id: RoomId::parse(id).expect("fixture room id must be valid"),
        }
    }

    /// Create a test room with a random id.
    #[must_use]
    pub fn random() -> Self {
        Self {
            id: RoomId::generate(),
        }
    }

    /// WebSocket path for this room.
    #[must_use]
    pub fn ws_path(&self) -> String {
        format!("/rooms/{}/ws", self.id)
    }
}

/// Test participant fixture.
#[derive(Debug, Clone)]
pub struct TestParticipant {
    /// Display name.
    pub name: String,
    /// Media-endpoint handle the browser would register.
    pub media_id: MediaId,
    /// Whether this participant claims the host role.
    pub is_host: bool,
}

impl TestParticipant {
    /// Create a guest with the given name and a media id derived from it.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let media_id = MediaId::parse(&format!("media-{}-{}", slug(&name), short_id()))
            .expect("derived media id must be valid");
        Self {
            name,
            media_id,
            is_host: false,
        }
    }

    /// Create a participant that claims the host role.
    #[must_use]
    pub fn host(name: impl Into<String>) -> Self {
        Self::new(name).as_host()
    }

    /// Create a guest with a random name.
    #[must_use]
    pub fn random() -> Self {
        Self::new(format!("Participant-{}", short_id()))
    }

    /// Claim the host role.
    #[must_use]
    pub fn as_host(mut self) -> Self {
        self.is_host = true;
        self
    }

    /// Set an explicit media id (for reproducible tests).
    ///
    /// # Panics
    ///
    /// Panics if `media_id` is not a valid media id.
    #[must_use]
    pub fn with_media_id(mut self, media_id: &str) -> Self {
        self.media_id = MediaId::parse(media_id).expect("fixture media id must be valid");
        self
    }

    /// The `join-room` frame this participant would send.
    #[must_use]
    pub fn join_frame(&self) -> serde_json::Value {
        json!({
            "type": "join-room",
            "name": self.name,
            "isHost": self.is_host,
            "mediaId": self.media_id.as_str(),
        })
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string().chars().take(8).collect()
}

fn slug(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
