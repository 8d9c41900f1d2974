//! Joins a room and prints every control event. Lines typed on stdin are
//! sent as `signal` payloads to the paired member.

use std::error::Error;

use clap::Parser;
use duplex::signaling::{ClientMessage, MemberId, RoomId, ServerMessage, SignalPayload};
use duplex::transport::SignalingClient;
use tokio::io::{self, AsyncBufReadExt};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duplex-probe")]
#[command(about = "Join a duplex room and watch its signaling traffic", long_about = None)]
struct Cli {
    /// Room to join
    room: String,

    /// Signaling server URL
    #[arg(long, default_value = "ws://127.0.0.1:8000")]
    url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let (client, mut events) = SignalingClient::connect(&cli.url).await?;
    client.emit(ClientMessage::JoinRoom(RoomId::new(cli.room.clone())))?;
    println!("Joined {} via {}", cli.room, cli.url);

    let mut remote: Option<MemberId> = None;
    let mut stdin = io::BufReader::new(io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    println!("Connection closed by server");
                    break;
                };
                match &event {
                    ServerMessage::OtherUser(id) | ServerMessage::UserJoined(id) => remote = Some(*id),
                    ServerMessage::UserLeft => remote = None,
                    _ => {}
                }
                println!("< {}", serde_json::to_string(&event)?);
                if matches!(event, ServerMessage::RoomFull) {
                    break;
                }
            }
            line = stdin.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match remote {
                    Some(target) => {
                        let signal = SignalPayload::new(serde_json::Value::String(line));
                        client.emit(ClientMessage::Signal { target, signal })?;
                    }
                    None => println!("(no paired member yet)"),
                }
            }
        }
    }

    client.disconnect().await;
    Ok(())
}
