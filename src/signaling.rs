//! WebSocket signaling server: room pairing and signal relay

mod actor;
mod messages;
mod registry;
mod relay;
mod server;
mod types;

pub use actor::RoomManagerHandle;
pub use messages::{ClientMessage, ServerMessage};
pub use registry::{JoinOutcome, Notice, RoomRegistry};
pub use relay::Switchboard;
pub use server::SignalingServer;
pub use types::{
    InvalidMemberId, MemberId, OutboundMessage, ROOM_CAPACITY, RoomId, SignalPayload,
    SignalingError,
};
