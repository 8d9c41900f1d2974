//! Best-effort forwarding of control messages to live connections.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::messages::ServerMessage;
use super::registry::Notice;
use super::types::{MemberId, OutboundMessage, SignalPayload};

/// Directory of connected endpoints keyed by member id.
#[derive(Debug, Default)]
pub struct Switchboard {
    /// Uses OutboundMessage (Arc-backed) so a send never copies the frame.
    lines: HashMap<MemberId, mpsc::UnboundedSender<OutboundMessage>>,
}

impl Switchboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, member: MemberId, tx: mpsc::UnboundedSender<OutboundMessage>) {
        self.lines.insert(member, tx);
    }

    pub fn unregister(&mut self, member: MemberId) -> bool {
        self.lines.remove(&member).is_some()
    }

    pub fn is_connected(&self, member: MemberId) -> bool {
        self.lines.contains_key(&member)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Deliver one message. Returns false when the member is gone.
    pub fn deliver(&self, to: MemberId, message: &ServerMessage) -> bool {
        let Some(tx) = self.lines.get(&to) else {
            return false;
        };
        match message.encode() {
            Ok(frame) => tx.send(frame).is_ok(),
            Err(e) => {
                warn!("Failed to encode message for {}: {}", to, e);
                false
            }
        }
    }

    pub fn deliver_all(&self, notices: Vec<Notice>) {
        for notice in notices {
            if !self.deliver(notice.to, &notice.message) {
                debug!("Dropped notice for departed member {}", notice.to);
            }
        }
    }

    /// Forward `signal` to `target` stamped with the true sender. Silently
    /// dropped when the target is not connected.
    pub fn relay(&self, source: MemberId, target: MemberId, signal: SignalPayload) -> bool {
        let message = ServerMessage::Signal {
            caller: source,
            signal,
        };
        let delivered = self.deliver(target, &message);
        if delivered {
            debug!("Relayed signal {} -> {}", source, target);
        } else {
            debug!("Dropped signal {} -> {} (target gone)", source, target);
        }
        delivered
    }
}
