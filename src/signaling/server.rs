//! WebSocket accept loop and per-connection tasks with ping/pong keepalive.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::RoomManagerHandle;
use super::messages::{ClientMessage, ServerMessage};
use super::types::{MemberId, OutboundMessage, SignalingError};
use crate::config::ServerConfig;

pub struct SignalingServer {
    listener: TcpListener,
    handle: RoomManagerHandle,
    config: ServerConfig,
}

impl SignalingServer {
    /// Bind the listener and start the room actor
    pub async fn bind(config: ServerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let handle = RoomManagerHandle::spawn(config.queue_depth);
        info!("Signaling server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            handle,
            config,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the room actor, for inspection
    pub fn rooms(&self) -> RoomManagerHandle {
        self.handle.clone()
    }

    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let handle = self.handle.clone();
            let config = self.config.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, handle, config).await {
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: RoomManagerHandle,
    config: ServerConfig,
) -> Result<(), SignalingError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<Message>();

    let member = handle.connect(tx.clone()).await?;
    info!("WebSocket connection from {} as {}", addr, member);

    let mut ping_interval = tokio::time::interval_at(
        tokio::time::Instant::now() + config.ping_interval,
        config.ping_interval,
    );
    let mut pong_deadline: Option<tokio::time::Instant> = None;

    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    let ws_msg = Message::Text(msg.into_inner());
                    if ws_tx.send(ws_msg).await.is_err() {
                        break;
                    }
                }
                Some(ctrl_msg) = ctrl_rx.recv() => {
                    if ws_tx.send(ctrl_msg).await.is_err() {
                        break;
                    }
                }
                else => break,
            }
        }
    });

    loop {
        let pong_timeout = async {
            match pong_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = ping_interval.tick() => {
                if pong_deadline.is_some() {
                    continue;
                }
                if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                    break;
                }
                pong_deadline = Some(tokio::time::Instant::now() + config.pong_timeout);
                debug!("Ping sent to {}", member);
            }

            _ = pong_timeout => {
                warn!("Pong timeout, disconnecting {}", member);
                break;
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", member, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        if let Err(e) = handle_text_message(&text, &tx, &handle, member).await {
                            warn!("Message handling error from {}: {}", member, e);
                        }
                    }
                    Message::Pong(_) => {
                        pong_deadline = None;
                        debug!("Pong received from {}", member);
                    }
                    Message::Close(_) => {
                        info!("Close received from {}", member);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // Same path for every exit: registry cleanup plus unregistration.
    handle.disconnect(member).await;

    send_task.abort();
    info!("WebSocket disconnected: {} ({})", member, addr);

    Ok(())
}

async fn handle_text_message(
    text: &str,
    tx: &mpsc::UnboundedSender<OutboundMessage>,
    handle: &RoomManagerHandle,
    member: MemberId,
) -> Result<(), SignalingError> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            let err = ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            };
            let _ = tx.send(err.encode()?);
            return Ok(());
        }
    };

    match client_msg {
        ClientMessage::JoinRoom(room) => {
            handle.join_room(member, room).await?;
        }

        ClientMessage::LeaveRoom => {
            handle.leave_room(member).await;
        }

        ClientMessage::Signal { target, signal } => {
            handle.relay(member, target, signal).await;
        }
    }

    Ok(())
}
