//! Two-party rendezvous: a signaling server that pairs members of a room and
//! relays their handshake data, plus the client session that consumes it.

pub mod config;
pub mod session;
pub mod signaling;
pub mod transport;
