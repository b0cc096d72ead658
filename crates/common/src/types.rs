//! Common identifier types for Huddle components.
//!
//! All identifiers serialize as plain strings so they can travel inside
//! signaling payloads without wrapping objects.

use crate::error::IdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum length of a caller-supplied room identifier.
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Maximum length of a media-connection identifier.
pub const MAX_MEDIA_ID_LEN: usize = 128;

/// Unique identifier for a room.
///
/// Either generated (UUIDv4, 122 bits of entropy) or supplied by the caller
/// as a path segment of `[A-Za-z0-9_-]{1,64}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Generate a fresh, unguessable room ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a caller-supplied room ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty, too long, or contains
    /// characters outside `[A-Za-z0-9_-]`.
    pub fn parse(value: &str) -> Result<Self, IdError> {
        if value.is_empty() {
            return Err(IdError::Empty("room id"));
        }
        if value.len() > MAX_ROOM_ID_LEN {
            return Err(IdError::TooLong {
                kind: "room id",
                max: MAX_ROOM_ID_LEN,
            });
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(IdError::InvalidCharacters("room id"));
        }
        Ok(Self(value.to_string()))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

/// Unique identifier for one transport connection.
///
/// Assigned by the signaling layer when the socket opens; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ConnectionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| IdError::NotUuid("connection id"))
    }
}

/// Opaque media-connection identifier assigned by the external
/// peer-connection broker.
///
/// The coordinator never interprets it; peers use it to target each other
/// when establishing direct media links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MediaId(String);

impl MediaId {
    /// Parse a media identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty or longer than
    /// [`MAX_MEDIA_ID_LEN`].
    pub fn parse(value: &str) -> Result<Self, IdError> {
        if value.trim().is_empty() {
            return Err(IdError::Empty("media id"));
        }
        if value.len() > MAX_MEDIA_ID_LEN {
            return Err(IdError::TooLong {
                kind: "media id",
                max: MAX_MEDIA_ID_LEN,
            });
        }
        Ok(Self(value.to_string()))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MediaId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MediaId> for String {
    fn from(id: MediaId) -> Self {
        id.0
    }
}
