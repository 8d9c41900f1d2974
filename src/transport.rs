//! Client end of the control channel: one WebSocket carrying
//! `ClientMessage` frames out and `ServerMessage` frames in.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use crate::signaling::{ClientMessage, ServerMessage};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport disconnected")]
    Disconnected,
}

/// Outbound half of the binding (`emit`).
pub trait SignalSink: Send {
    fn emit(&self, message: ClientMessage) -> Result<(), TransportError>;
}

impl SignalSink for mpsc::UnboundedSender<ClientMessage> {
    fn emit(&self, message: ClientMessage) -> Result<(), TransportError> {
        self.send(message).map_err(|_| TransportError::Disconnected)
    }
}

/// Cloneable sender that writes into a client's socket.
#[derive(Debug, Clone)]
pub struct Emitter {
    outbound: mpsc::UnboundedSender<Message>,
}

impl SignalSink for Emitter {
    fn emit(&self, message: ClientMessage) -> Result<(), TransportError> {
        let json = serde_json::to_string(&message)?;
        self.outbound
            .send(Message::text(json))
            .map_err(|_| TransportError::Disconnected)
    }
}

pub struct SignalingClient {
    emitter: Emitter,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl SignalingClient {
    /// Open the socket. Decoded server events arrive on the returned
    /// receiver (`on`); it closes when the connection is lost.
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerMessage>), TransportError> {
        let (ws_stream, _) = connect_async(url).await?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        info!("Connected to signaling server {}", url);

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ServerMessage>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if ws_tx.send(msg).await.is_err() || closing {
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(event) => {
                            if event_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Undecodable server frame: {}", e),
                    },
                    Ok(Message::Close(_)) => {
                        debug!("Server closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        });

        let client = Self {
            emitter: Emitter { outbound: out_tx },
            writer,
            reader,
        };
        Ok((client, event_rx))
    }

    pub fn emitter(&self) -> Emitter {
        self.emitter.clone()
    }

    pub fn emit(&self, message: ClientMessage) -> Result<(), TransportError> {
        self.emitter.emit(message)
    }

    /// Send a close frame and wait for the writer to flush it.
    pub async fn disconnect(self) {
        let _ = self.emitter.outbound.send(Message::Close(None));
        let _ = self.writer.await;
        self.reader.abort();
        info!("Disconnected from signaling server");
    }
}
