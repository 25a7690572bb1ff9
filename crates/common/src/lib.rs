// ================
// common/src/lib.rs
// ================
//! Common types shared between the campus server and its clients.
//! This module defines the realtime room protocol and the small set of
//! values that appear on both sides of the HTTP surface.

use serde::{Deserialize, Serialize};

/// Room identifier as sent on the wire
pub type RoomId = String;

/// Events sent from a client over the realtime connection
///
/// Frames are adjacently tagged: `{"event": "...", "data": ...}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join a room
    /// # Fields
    /// * `0` - ID of the room to join
    JoinRoom(RoomId),
    /// Relay a payload to every member of a room
    Message(RoomMessage),
}

/// Events sent from the server to a connected client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A payload relayed within a room
    Message(RoomMessage),
}

/// A payload addressed to a room
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessage {
    /// Room the payload is addressed to
    pub room_id: RoomId,
    /// Opaque application payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Role attached to every user account
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Database / wire representation
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    /// Parse the database / wire representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "USER" => Some(Role::User),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Body of every error response
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}
