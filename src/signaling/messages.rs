//! JSON control messages exchanged over the signaling socket.

use serde::{Deserialize, Serialize};

use super::types::{MemberId, OutboundMessage, RoomId, SignalPayload};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// Request admission to a room
    #[serde(rename = "join room")]
    JoinRoom(RoomId),

    /// Leave whatever room this connection is in
    #[serde(rename = "leave room")]
    LeaveRoom,

    /// Outbound handshake payload for another member
    #[serde(rename = "signal")]
    Signal {
        target: MemberId,
        signal: SignalPayload,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Admission rejected, the room already has two members
    #[serde(rename = "room full")]
    RoomFull,

    /// Recipient is the caller; the id is the member already waiting
    #[serde(rename = "other user")]
    OtherUser(MemberId),

    /// Recipient is the callee; the id is the member that just arrived
    #[serde(rename = "user joined")]
    UserJoined(MemberId),

    /// The counterpart departed
    #[serde(rename = "user left")]
    UserLeft,

    /// Inbound handshake payload, `caller` set by the server
    #[serde(rename = "signal")]
    Signal {
        caller: MemberId,
        signal: SignalPayload,
    },

    /// Error response
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<OutboundMessage, serde_json::Error> {
        Ok(OutboundMessage::from(serde_json::to_string(self)?))
    }
}
