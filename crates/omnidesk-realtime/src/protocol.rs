// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shapes exchanged over the socket.
//!
//! Every frame is a JSON object with an `action` discriminator. Clients send
//! [`ClientEvent`]s; rooms fan out [`RoomEvent`]s; listeners receive
//! [`Presence`] snapshots.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SEND_MESSAGE: &str = "send-message";
pub const JOIN_ROOM: &str = "join-room";
pub const LEAVE_ROOM: &str = "leave-room";
pub const USER_JOIN: &str = "user-join";
pub const USER_LEFT: &str = "user-left";
pub const ROOM_JOINED: &str = "room-joined";

/// An encoded frame, shared between every buffer it is fanned out to.
pub type Frame = Arc<str>;

/// A room or user reference as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
}

impl Member {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Whether a client joined a room that already existed.
///
/// A room created by the join itself was opened by the inbound webhook
/// path; an existing one means a dashboard was already watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomOrigin {
    Webhook,
    Omnichannel,
}

/// Event sent by a connected client.
///
/// `sender` and `room` are ignored if present; the session stamps its own.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEvent {
    pub action: String,
    #[serde(default)]
    pub message: Value,
}

/// Event fanned out to every member of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    pub action: String,
    pub message: Value,
    pub sender: Member,
    pub room: Member,
}

/// Snapshot of online rooms and users pushed to listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub action: String,
    pub online: Vec<Member>,
    pub online_user: Vec<Member>,
}

/// Serialize a value into a shareable frame.
///
/// Returns `None` (and logs) if serialization fails, which only happens for
/// values with non-string map keys.
pub fn encode<T: Serialize>(value: &T) -> Option<Frame> {
    match serde_json::to_string(value) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode socket frame");
            None
        }
    }
}
