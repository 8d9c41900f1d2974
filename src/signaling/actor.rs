//! Room manager actor: the single owner of room membership and the connection directory.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::registry::{JoinOutcome, RoomRegistry};
use super::relay::Switchboard;
use super::types::{MemberId, OutboundMessage, RoomId, SignalPayload, SignalingError};

/// Commands sent to the room manager actor
pub(crate) enum RoomCommand {
    Connect {
        peer_tx: mpsc::UnboundedSender<OutboundMessage>,
        reply: oneshot::Sender<MemberId>,
    },
    Join {
        member: MemberId,
        room: RoomId,
        reply: oneshot::Sender<JoinOutcome>,
    },
    Leave {
        member: MemberId,
    },
    Relay {
        source: MemberId,
        target: MemberId,
        signal: SignalPayload,
    },
    Disconnect {
        member: MemberId,
    },
    Members {
        room: RoomId,
        reply: oneshot::Sender<Vec<MemberId>>,
    },
}

/// Single owner of the registry and the switchboard. Every command is
/// applied to completion before the next one is read.
pub(crate) async fn room_manager_actor(mut rx: mpsc::Receiver<RoomCommand>) {
    let mut registry = RoomRegistry::new();
    let mut board = Switchboard::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RoomCommand::Connect { peer_tx, reply } => {
                let mut member = MemberId::generate();
                while board.is_connected(member) {
                    member = MemberId::generate();
                }
                board.register(member, peer_tx);
                debug!("Member {} connected ({} live)", member, board.len());
                let _ = reply.send(member);
            }

            RoomCommand::Join {
                member,
                room,
                reply,
            } => {
                let (outcome, notices) = registry.join(member, &room);
                board.deliver_all(notices);

                match outcome {
                    JoinOutcome::Waiting => info!("Member {} waiting in room {}", member, room),
                    JoinOutcome::Paired { existing } => {
                        info!("Member {} paired with {} in room {}", member, existing, room)
                    }
                    JoinOutcome::RoomFull => info!("Member {} rejected, room {} full", member, room),
                }
                let _ = reply.send(outcome);
            }

            RoomCommand::Leave { member } => {
                board.deliver_all(registry.leave(member));
            }

            RoomCommand::Relay {
                source,
                target,
                signal,
            } => {
                board.relay(source, target, signal);
            }

            RoomCommand::Disconnect { member } => {
                // Registry cleanup and unregistration happen in the same step,
                // so the counterpart always hears `user left`.
                board.deliver_all(registry.leave(member));
                if board.unregister(member) {
                    debug!("Member {} disconnected ({} live)", member, board.len());
                }
            }

            RoomCommand::Members { room, reply } => {
                let members = registry.members(&room).map(<[MemberId]>::to_vec);
                let _ = reply.send(members.unwrap_or_default());
            }
        }
    }
}

/// Handle to communicate with the room manager actor
#[derive(Clone)]
pub struct RoomManagerHandle {
    pub(crate) tx: mpsc::Sender<RoomCommand>,
}

impl RoomManagerHandle {
    /// Spawn the actor on the current runtime
    pub fn spawn(queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel::<RoomCommand>(queue_depth);
        tokio::spawn(room_manager_actor(rx));
        Self { tx }
    }

    /// Register a new connection and get its member id
    pub async fn connect(
        &self,
        peer_tx: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Result<MemberId, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Connect {
            peer_tx,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }

    /// Join a room. Notifications (including `room full`) are delivered by
    /// the actor; the outcome is returned for the caller's bookkeeping.
    pub async fn join_room(
        &self,
        member: MemberId,
        room: RoomId,
    ) -> Result<JoinOutcome, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            member,
            room,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }

    /// Leave the current room, keeping the connection registered
    pub async fn leave_room(&self, member: MemberId) {
        let _ = self.tx.send(RoomCommand::Leave { member }).await;
    }

    /// Forward a signal payload, stamped with `source`
    pub async fn relay(&self, source: MemberId, target: MemberId, signal: SignalPayload) {
        let _ = self
            .tx
            .send(RoomCommand::Relay {
                source,
                target,
                signal,
            })
            .await;
    }

    /// Leave every room and forget the connection
    pub async fn disconnect(&self, member: MemberId) {
        let _ = self.tx.send(RoomCommand::Disconnect { member }).await;
    }

    /// Current members of a room in arrival order
    pub async fn members(&self, room: RoomId) -> Result<Vec<MemberId>, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Members {
            room,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), SignalingError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }
}
