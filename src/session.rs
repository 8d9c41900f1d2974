//! Client-side connection session: pairing, negotiation and reconnection

mod driver;
mod machine;
mod peer;
mod types;

pub use driver::{RoomSession, SessionHandle, drive};
pub use machine::Session;
pub use peer::{PeerConnector, PeerError, PeerEvent, PeerEvents, PeerHandle, StreamHandle};
pub use types::{
    CloseReason, LinkStatus, Role, SessionError, SessionEvent, SessionInput, SessionState,
};
