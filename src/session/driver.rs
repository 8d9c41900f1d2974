//! Runs a session against a live signaling connection.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::machine::Session;
use super::peer::PeerConnector;
use super::types::{SessionError, SessionEvent, SessionInput};
use crate::config::SessionConfig;
use crate::signaling::{RoomId, ServerMessage};
use crate::transport::SignalingClient;

/// Cloneable handle for commands into a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inbox: async_channel::Sender<SessionInput>,
}

impl SessionHandle {
    /// Create a handle and the matching input receiver
    pub fn channel() -> (Self, async_channel::Receiver<SessionInput>) {
        let (inbox, rx) = async_channel::unbounded();
        (Self { inbox }, rx)
    }

    pub fn inbox(&self) -> async_channel::Sender<SessionInput> {
        self.inbox.clone()
    }

    /// Send chat text to the remote member over the direct link
    pub async fn send_data(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(SessionInput::SendData {
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn leave(&self) {
        let _ = self.inbox.send(SessionInput::Leave).await;
    }
}

/// Apply server events and session inputs in arrival order until the
/// session closes. A closed server stream counts as transport loss.
pub async fn drive<C: PeerConnector>(
    session: &mut Session<C>,
    inbox: async_channel::Receiver<SessionInput>,
    mut server: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while !session.is_closed() {
        tokio::select! {
            message = server.recv() => match message {
                Some(message) => session.apply(SessionInput::Server(message)),
                None => {
                    warn!("Signaling connection lost");
                    session.apply(SessionInput::TransportLost);
                }
            },
            input = inbox.recv() => match input {
                Ok(input) => session.apply(input),
                Err(_) => session.leave(),
            },
        }
    }
}

/// A session joined to a room over its own signaling connection
pub struct RoomSession {
    pub handle: SessionHandle,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    task: JoinHandle<()>,
}

impl RoomSession {
    /// Connect, join `room`, and run the session on a background task.
    /// The socket is closed when the session closes, which makes the
    /// server drop this member and notify the counterpart.
    pub async fn start<C>(
        url: &str,
        room: RoomId,
        connector: C,
        config: SessionConfig,
    ) -> Result<Self, SessionError>
    where
        C: PeerConnector + 'static,
        C::Peer: 'static,
    {
        let (client, server_rx) = SignalingClient::connect(url).await?;
        let (handle, inbox) = SessionHandle::channel();
        let (mut session, events) = Session::new(config, connector, client.emitter(), handle.inbox());
        session.join(room)?;

        let task = tokio::spawn(async move {
            drive(&mut session, inbox, server_rx).await;
            drop(session);
            client.disconnect().await;
            info!("Room session finished");
        });

        Ok(Self {
            handle,
            events,
            task,
        })
    }

    /// Wait for the session task to finish
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}
