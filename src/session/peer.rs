//! Seam to the peer-connection library and the owned-object slot.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::types::SessionInput;
use crate::signaling::SignalPayload;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("signal rejected: {0}")]
    SignalRejected(String),

    #[error("peer connection failed: {0}")]
    Failed(String),

    #[error("data channel not open")]
    ChannelClosed,
}

/// Opaque remote media handle, handed through to the UI untouched.
#[derive(Clone)]
pub struct StreamHandle(Arc<dyn Any + Send + Sync>);

impl StreamHandle {
    pub fn new<T: Any + Send + Sync>(stream: T) -> Self {
        Self(Arc::new(stream))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamHandle(..)")
    }
}

/// Lifecycle callbacks of one peer-connection object
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// Handshake data to relay to the remote member
    Signal(SignalPayload),
    /// Direct link established
    Connect,
    Stream(StreamHandle),
    Data(Vec<u8>),
    Error(String),
    Close,
}

/// Callback sender given to each new object. Events are tagged with the
/// object's generation so the session can drop those of destroyed objects.
#[derive(Debug, Clone)]
pub struct PeerEvents {
    generation: u64,
    inbox: async_channel::Sender<SessionInput>,
}

impl PeerEvents {
    pub(crate) fn new(generation: u64, inbox: async_channel::Sender<SessionInput>) -> Self {
        Self { generation, inbox }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the session is gone.
    pub fn emit(&self, event: PeerEvent) -> bool {
        self.inbox
            .try_send(SessionInput::Peer {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// A live peer-connection object
pub trait PeerHandle: Send {
    /// Apply handshake data from the remote side
    fn signal(&mut self, payload: SignalPayload) -> Result<(), PeerError>;

    /// Send application data over the direct link
    fn send(&mut self, data: &[u8]) -> Result<(), PeerError>;

    /// Release all resources. Called exactly once per object.
    fn destroy(&mut self);
}

/// Factory for peer-connection objects. Owns the local capture and attaches
/// it to every object it creates.
pub trait PeerConnector: Send {
    type Peer: PeerHandle;

    fn create(&mut self, initiator: bool, events: PeerEvents) -> Result<Self::Peer, PeerError>;

    /// Stop captured local media. Called once when the session closes.
    fn release_media(&mut self) {}
}

/// Holds at most one live object; destroys before replacing.
pub(crate) struct PeerSlot<P: PeerHandle> {
    current: Option<(u64, P)>,
    generations: u64,
}

impl<P: PeerHandle> PeerSlot<P> {
    pub(crate) fn new() -> Self {
        Self {
            current: None,
            generations: 0,
        }
    }

    /// Destroy the current object, then install the one `build` returns.
    pub(crate) fn replace_with<F>(&mut self, build: F) -> Result<u64, PeerError>
    where
        F: FnOnce(u64) -> Result<P, PeerError>,
    {
        self.clear();
        self.generations += 1;
        let generation = self.generations;
        let peer = build(generation)?;
        self.current = Some((generation, peer));
        Ok(generation)
    }

    /// Destroy the current object if any. Returns whether one existed.
    pub(crate) fn clear(&mut self) -> bool {
        match self.current.take() {
            Some((generation, mut peer)) => {
                peer.destroy();
                debug!("Destroyed peer connection #{}", generation);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        matches!(self.current, Some((g, _)) if g == generation)
    }

    pub(crate) fn is_occupied(&self) -> bool {
        self.current.is_some()
    }

    pub(crate) fn get_mut(&mut self) -> Option<&mut P> {
        self.current.as_mut().map(|(_, peer)| peer)
    }
}

impl<P: PeerHandle> Drop for PeerSlot<P> {
    fn drop(&mut self) {
        self.clear();
    }
}
