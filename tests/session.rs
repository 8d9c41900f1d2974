//! Two client sessions negotiating through a live signaling server with a
//! scripted peer-connection stand-in.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use duplex::config::{ServerConfig, SessionConfig};
use duplex::session::{
    CloseReason, LinkStatus, PeerConnector, PeerError, PeerEvent, PeerEvents, PeerHandle,
    RoomSession, Session, SessionEvent, SessionHandle, SessionState, drive,
};
use duplex::signaling::{
    ClientMessage, MemberId, RoomId, RoomManagerHandle, ServerMessage, SignalPayload,
    SignalingServer,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Offers on creation when initiating, answers offers, and reports a
/// direct link once the handshake is complete.
struct ScriptedPeer {
    events: PeerEvents,
    sent: Arc<Mutex<Vec<String>>>,
}

impl PeerHandle for ScriptedPeer {
    fn signal(&mut self, payload: SignalPayload) -> Result<(), PeerError> {
        match payload.as_value()["type"].as_str() {
            Some("offer") => {
                self.events
                    .emit(PeerEvent::Signal(SignalPayload::new(json!({"type": "answer", "sdp": "a"}))));
                self.events.emit(PeerEvent::Connect);
                Ok(())
            }
            Some("answer") => {
                self.events.emit(PeerEvent::Connect);
                Ok(())
            }
            _ => Err(PeerError::SignalRejected("unknown payload".into())),
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<(), PeerError> {
        self.sent
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn destroy(&mut self) {}
}

#[derive(Clone, Default)]
struct ScriptedConnector {
    sent: Arc<Mutex<Vec<String>>>,
    released: Arc<Mutex<usize>>,
}

impl PeerConnector for ScriptedConnector {
    type Peer = ScriptedPeer;

    fn create(&mut self, initiator: bool, events: PeerEvents) -> Result<ScriptedPeer, PeerError> {
        if initiator {
            events.emit(PeerEvent::Signal(SignalPayload::new(json!({"type": "offer", "sdp": "o"}))));
        }
        Ok(ScriptedPeer {
            events,
            sent: self.sent.clone(),
        })
    }

    fn release_media(&mut self) {
        *self.released.lock().unwrap() += 1;
    }
}

async fn start_server() -> (String, RoomManagerHandle) {
    let config = ServerConfig::default().with_bind_addr("127.0.0.1:0");
    let server = SignalingServer::bind(config).await.unwrap();
    let url = format!("ws://{}", server.local_addr().unwrap());
    let rooms = server.rooms();
    tokio::spawn(server.run());
    (url, rooms)
}

async fn wait_members(rooms: &RoomManagerHandle, room: &RoomId, count: usize) {
    for _ in 0..200 {
        if rooms.members(room.clone()).await.unwrap().len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("room {} never reached {} members", room, count);
}

async fn wait_for<F>(events: &mut mpsc::UnboundedReceiver<SessionEvent>, mut pred: F)
where
    F: FnMut(&SessionEvent) -> bool,
{
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("session event stream ended");
        if pred(&event) {
            return;
        }
    }
}

#[tokio::test]
async fn two_sessions_connect_chat_and_tear_down() {
    let (url, rooms) = start_server().await;
    let room = RoomId::from("call");

    let first_connector = ScriptedConnector::default();
    let mut first = RoomSession::start(
        &url,
        room.clone(),
        first_connector.clone(),
        SessionConfig::default(),
    )
    .await
    .unwrap();
    wait_members(&rooms, &room, 1).await;

    let second_connector = ScriptedConnector::default();
    let mut second = RoomSession::start(
        &url,
        room.clone(),
        second_connector.clone(),
        SessionConfig::default(),
    )
    .await
    .unwrap();

    wait_for(&mut first.events, |e| {
        matches!(e, SessionEvent::Status(LinkStatus::Connected))
    })
    .await;
    wait_for(&mut second.events, |e| {
        matches!(e, SessionEvent::Status(LinkStatus::Connected))
    })
    .await;

    second.handle.send_data("hello").await.unwrap();
    assert_eq!(*second_connector.sent.lock().unwrap(), vec!["hello".to_string()]);

    second.handle.leave().await;
    wait_for(&mut second.events, |e| {
        matches!(e, SessionEvent::Closed(CloseReason::Left))
    })
    .await;
    wait_for(&mut first.events, |e| {
        matches!(e, SessionEvent::Closed(CloseReason::PeerLeft))
    })
    .await;

    assert!(first.handle.send_data("anyone?").await.is_err());
    second.finished().await;
    first.finished().await;
    wait_members(&rooms, &room, 0).await;
    assert_eq!(*first_connector.released.lock().unwrap(), 1);
    assert_eq!(*second_connector.released.lock().unwrap(), 1);
}

#[tokio::test]
async fn third_session_is_turned_away() {
    let (url, rooms) = start_server().await;
    let room = RoomId::from("busy");

    let _first = RoomSession::start(&url, room.clone(), ScriptedConnector::default(), SessionConfig::default())
        .await
        .unwrap();
    wait_members(&rooms, &room, 1).await;
    let _second = RoomSession::start(&url, room.clone(), ScriptedConnector::default(), SessionConfig::default())
        .await
        .unwrap();
    wait_members(&rooms, &room, 2).await;

    let mut third = RoomSession::start(&url, room.clone(), ScriptedConnector::default(), SessionConfig::default())
        .await
        .unwrap();
    wait_for(&mut third.events, |e| {
        matches!(e, SessionEvent::Closed(CloseReason::RoomFull))
    })
    .await;
    third.finished().await;
    assert_eq!(rooms.members(room).await.unwrap().len(), 2);
}

#[tokio::test]
async fn lost_transport_tears_the_session_down() {
    let connector = ScriptedConnector::default();
    let (sink, mut outbound) = mpsc::unbounded_channel::<ClientMessage>();
    let (handle, inbox) = SessionHandle::channel();
    let (mut session, mut events) =
        Session::new(SessionConfig::default(), connector.clone(), sink, handle.inbox());
    let (server_tx, server_rx) = mpsc::unbounded_channel();

    session.join(RoomId::from("R")).unwrap();
    assert!(matches!(outbound.recv().await, Some(ClientMessage::JoinRoom(_))));

    let remote = MemberId::try_from("m_00000000000000ff").unwrap();
    server_tx.send(ServerMessage::OtherUser(remote)).unwrap();
    drop(server_tx);

    timeout(Duration::from_secs(5), drive(&mut session, inbox, server_rx))
        .await
        .unwrap();

    assert_eq!(session.state(), SessionState::Closed);
    assert!(!session.has_peer());
    assert_eq!(*connector.released.lock().unwrap(), 1);

    let mut last = None;
    while let Ok(event) = events.try_recv() {
        last = Some(event);
    }
    assert!(matches!(last, Some(SessionEvent::Closed(CloseReason::TransportLost))));
}
