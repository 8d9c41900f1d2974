//! `duplex` signaling server.

use clap::Parser;
use duplex::config::{DEFAULT_SIGNALING_PORT, ServerConfig};
use duplex::signaling::SignalingServer;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duplex")]
#[command(about = "Signaling server that pairs two members per room", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value_t = format!("0.0.0.0:{}", DEFAULT_SIGNALING_PORT))]
    bind: String,

    /// Seconds between keepalive pings
    #[arg(long, default_value_t = 30)]
    ping_interval: u64,

    /// Seconds to wait for a pong before dropping a connection
    #[arg(long, default_value_t = 10)]
    pong_timeout: u64,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ServerConfig {
        ping_interval: std::time::Duration::from_secs(cli.ping_interval),
        pong_timeout: std::time::Duration::from_secs(cli.pong_timeout),
        ..ServerConfig::default().with_bind_addr(cli.bind)
    };

    println!("   Duplex signaling server");
    println!("   Binding to {}", config.bind_addr);
    println!("   Press Ctrl+C to stop\n");

    let server = SignalingServer::bind(config).await?;
    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            println!("Shutting down");
            Ok(())
        }
    }
}
