//! Client-side pairing state machine.

use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::peer::{PeerConnector, PeerEvent, PeerEvents, PeerHandle, PeerSlot};
use super::types::{
    CloseReason, LinkStatus, Role, SessionError, SessionEvent, SessionInput, SessionState,
};
use crate::config::SessionConfig;
use crate::signaling::{ClientMessage, MemberId, RoomId, ServerMessage, SignalPayload};
use crate::transport::SignalSink;

struct PendingReconnect {
    epoch: u64,
    timer: JoinHandle<()>,
}

/// Client-side pairing state machine for one room.
///
/// All inputs go through [`Session::apply`] (or the direct methods it
/// dispatches to) from a single task, so transitions never interleave.
pub struct Session<C: PeerConnector> {
    config: SessionConfig,
    connector: C,
    sink: Box<dyn SignalSink>,
    events: mpsc::UnboundedSender<SessionEvent>,
    inbox: async_channel::Sender<SessionInput>,

    state: SessionState,
    role: Option<Role>,
    room: Option<RoomId>,
    remote: Option<MemberId>,
    slot: PeerSlot<C::Peer>,

    reconnect: Option<PendingReconnect>,
    reconnect_epoch: u64,
    media_released: bool,
}

impl<C: PeerConnector> Session<C> {
    /// `inbox` must feed back into this session's input loop; peer callbacks
    /// and reconnect timers post there.
    pub fn new(
        config: SessionConfig,
        connector: C,
        sink: impl SignalSink + 'static,
        inbox: async_channel::Sender<SessionInput>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            config,
            connector,
            sink: Box::new(sink),
            events,
            inbox,
            state: SessionState::Idle,
            role: None,
            room: None,
            remote: None,
            slot: PeerSlot::new(),
            reconnect: None,
            reconnect_epoch: 0,
            media_released: false,
        };
        (session, events_rx)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    pub fn remote(&self) -> Option<MemberId> {
        self.remote
    }

    pub fn has_peer(&self) -> bool {
        self.slot.is_occupied()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Send `join room` and start waiting for a counterpart.
    pub fn join(&mut self, room: RoomId) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Closed => return Err(SessionError::Closed),
            _ => return Err(SessionError::AlreadyJoined),
        }

        if let Err(e) = self.sink.emit(ClientMessage::JoinRoom(room.clone())) {
            self.close(CloseReason::TransportLost);
            return Err(e.into());
        }
        info!("Joining room {}", room);
        self.room = Some(room);
        self.state = SessionState::AwaitingPeer;
        Ok(())
    }

    pub fn apply(&mut self, input: SessionInput) {
        match input {
            SessionInput::Server(message) => self.handle_server(message),
            SessionInput::Peer { generation, event } => self.handle_peer(generation, event),
            SessionInput::ReconnectDue { epoch } => self.reconnect_due(epoch),
            SessionInput::SendData { text, reply } => {
                let _ = reply.send(self.send_data(&text));
            }
            SessionInput::Leave => self.leave(),
            SessionInput::TransportLost => self.close(CloseReason::TransportLost),
        }
    }

    pub fn handle_server(&mut self, message: ServerMessage) {
        if matches!(self.state, SessionState::Idle | SessionState::Closed) {
            debug!("Ignoring {:?} in state {:?}", message, self.state);
            return;
        }

        match message {
            ServerMessage::RoomFull => {
                warn!("Room {:?} is full", self.room);
                self.close(CloseReason::RoomFull);
            }
            ServerMessage::OtherUser(member) => self.peer_found(member),
            ServerMessage::UserJoined(member) => self.peer_joined(member),
            ServerMessage::UserLeft => {
                info!("Remote member left");
                self.close(CloseReason::PeerLeft);
            }
            ServerMessage::Signal { caller, signal } => self.signal_received(caller, signal),
            ServerMessage::Error { message } => warn!("Server error: {}", message),
        }
    }

    /// We arrived second: negotiate as caller right away.
    fn peer_found(&mut self, member: MemberId) {
        info!("Paired with {} as caller", member);
        self.cancel_reconnect();
        self.remote = Some(member);
        self.role = Some(Role::Caller);
        self.start_negotiation(Role::Caller);
    }

    /// We were waiting: wait for the caller's first signal before building
    /// our object.
    fn peer_joined(&mut self, member: MemberId) {
        self.cancel_reconnect();
        if self.remote == Some(member)
            && self.role == Some(Role::Callee)
            && self.slot.is_occupied()
        {
            // Its first signal got here first and the callee is already built.
            debug!("Pairing with {} confirmed, keeping peer connection", member);
            return;
        }

        info!("Paired with {} as callee", member);
        self.slot.clear();
        self.remote = Some(member);
        self.role = Some(Role::Callee);
        self.state = SessionState::Negotiating;
        self.emit(SessionEvent::Status(LinkStatus::Connecting));
    }

    fn signal_received(&mut self, caller: MemberId, signal: SignalPayload) {
        if let Some(remote) = self.remote
            && remote != caller
        {
            warn!("Dropping signal from {} (paired with {})", caller, remote);
            return;
        }

        // Signal raced ahead of (or replaced) the pairing notification.
        if !self.slot.is_occupied() {
            debug!("Signal from {} with no peer object, answering as callee", caller);
            self.cancel_reconnect();
            self.remote = Some(caller);
            self.role = Some(Role::Callee);
            if !self.start_negotiation(Role::Callee) {
                return;
            }
        }

        let Some(peer) = self.slot.get_mut() else {
            return;
        };
        if let Err(e) = peer.signal(signal) {
            warn!("Failed to apply signal from {}: {}", caller, e);
            self.peer_lost();
        }
    }

    /// Destroy any owned object, then build a new one for `role`.
    fn start_negotiation(&mut self, role: Role) -> bool {
        let inbox = &self.inbox;
        let connector = &mut self.connector;
        let created = self.slot.replace_with(|generation| {
            connector.create(role.is_initiator(), PeerEvents::new(generation, inbox.clone()))
        });

        match created {
            Ok(generation) => {
                debug!("Created peer connection #{} as {:?}", generation, role);
                self.state = SessionState::Negotiating;
                self.emit(SessionEvent::Status(LinkStatus::Connecting));
                true
            }
            Err(e) => {
                warn!("Failed to create peer connection: {}", e);
                self.state = SessionState::AwaitingPeer;
                self.schedule_reconnect();
                false
            }
        }
    }

    pub fn handle_peer(&mut self, generation: u64, event: PeerEvent) {
        if !self.slot.is_current(generation) {
            debug!("Ignoring {:?} from stale peer connection #{}", event, generation);
            return;
        }

        match event {
            PeerEvent::Signal(signal) => {
                let Some(target) = self.remote else {
                    return;
                };
                if let Err(e) = self.sink.emit(ClientMessage::Signal { target, signal }) {
                    warn!("Failed to send signal: {}", e);
                    self.close(CloseReason::TransportLost);
                }
            }
            PeerEvent::Connect => {
                info!("Direct link established with {:?}", self.remote);
                self.state = SessionState::Connected;
                self.emit(SessionEvent::Status(LinkStatus::Connected));
            }
            PeerEvent::Stream(stream) => self.emit(SessionEvent::RemoteStream(stream)),
            PeerEvent::Data(data) => {
                self.emit(SessionEvent::Data(String::from_utf8_lossy(&data).into_owned()))
            }
            PeerEvent::Error(message) => {
                warn!("Peer connection error: {}", message);
                self.peer_lost();
            }
            PeerEvent::Close => {
                info!("Peer connection closed");
                self.peer_lost();
            }
        }
    }

    /// The owned object died. Retry as caller while the remote is known.
    fn peer_lost(&mut self) {
        self.slot.clear();
        self.state = SessionState::AwaitingPeer;
        self.emit(SessionEvent::Status(LinkStatus::Disconnected));
        if self.remote.is_some() {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect.is_some() || self.remote.is_none() {
            return;
        }
        self.reconnect_epoch += 1;
        let epoch = self.reconnect_epoch;
        let delay = self.retry_delay();
        let inbox = self.inbox.clone();

        debug!("Reconnecting in {:?}", delay);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbox.send(SessionInput::ReconnectDue { epoch }).await;
        });
        self.reconnect = Some(PendingReconnect { epoch, timer });
    }

    fn retry_delay(&self) -> Duration {
        let jitter = self.config.reconnect_jitter;
        if jitter.is_zero() {
            return self.config.reconnect_delay;
        }
        self.config.reconnect_delay + rand::rng().random_range(Duration::ZERO..=jitter)
    }

    fn cancel_reconnect(&mut self) {
        if let Some(pending) = self.reconnect.take() {
            pending.timer.abort();
            debug!("Cancelled reconnect #{}", pending.epoch);
        }
    }

    fn reconnect_due(&mut self, epoch: u64) {
        match &self.reconnect {
            Some(pending) if pending.epoch == epoch => self.reconnect = None,
            _ => {
                debug!("Ignoring cancelled reconnect #{}", epoch);
                return;
            }
        }

        if self.state != SessionState::AwaitingPeer || self.slot.is_occupied() {
            return;
        }
        if let Some(remote) = self.remote {
            info!("Renegotiating with {} as caller", remote);
            self.role = Some(Role::Caller);
            self.start_negotiation(Role::Caller);
        }
    }

    /// Send chat text over the direct link.
    pub fn send_data(&mut self, text: &str) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        if self.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }
        let peer = self.slot.get_mut().ok_or(SessionError::NotConnected)?;
        peer.send(text.as_bytes())?;
        Ok(())
    }

    /// Leave the room. A second call does nothing.
    pub fn leave(&mut self) {
        if self.is_closed() {
            return;
        }
        if self.room.is_some() {
            let _ = self.sink.emit(ClientMessage::LeaveRoom);
        }
        self.close(CloseReason::Left);
    }

    /// Teardown: destroy the object, release media, stop timers.
    fn close(&mut self, reason: CloseReason) {
        if self.is_closed() {
            return;
        }
        self.cancel_reconnect();
        let had_link = self.slot.clear() || self.state == SessionState::Connected;
        if !self.media_released {
            self.connector.release_media();
            self.media_released = true;
        }
        self.state = SessionState::Closed;
        self.remote = None;

        if had_link {
            self.emit(SessionEvent::Status(LinkStatus::Disconnected));
        }
        self.emit(SessionEvent::Closed(reason));
        info!("Session closed: {:?}", reason);
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

impl<C: PeerConnector> Drop for Session<C> {
    fn drop(&mut self) {
        self.cancel_reconnect();
        self.slot.clear();
        if !self.media_released {
            self.connector.release_media();
        }
    }
}
