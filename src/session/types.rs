//! Session states, roles, events, inputs and errors.

use thiserror::Error;
use tokio::sync::oneshot;

use super::peer::{PeerError, PeerEvent, StreamHandle};
use crate::signaling::ServerMessage;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session already joined a room")]
    AlreadyJoined,

    #[error("no connected peer")]
    NotConnected,

    #[error("session is closed")]
    Closed,

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingPeer,
    Negotiating,
    Connected,
    Closed,
}

/// Which side starts negotiation. Fixed for the life of a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Caller,
    Callee,
}

impl Role {
    pub fn is_initiator(self) -> bool {
        self == Role::Caller
    }
}

/// Link status reported to the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Left,
    PeerLeft,
    RoomFull,
    TransportLost,
}

/// Everything the session tells the UI layer
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Status(LinkStatus),
    RemoteStream(StreamHandle),
    Data(String),
    Closed(CloseReason),
}

/// Inputs applied to a session, strictly one at a time in arrival order.
#[derive(Debug)]
pub enum SessionInput {
    Server(ServerMessage),
    Peer { generation: u64, event: PeerEvent },
    ReconnectDue { epoch: u64 },
    SendData {
        text: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Leave,
    TransportLost,
}
