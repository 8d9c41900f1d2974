//! Runtime settings for the server and the client session.

use std::time::Duration;

pub const DEFAULT_SIGNALING_PORT: u16 = 8000;
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_RECONNECT_JITTER: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    /// Capacity of the room actor's command queue
    pub queue_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_SIGNALING_PORT),
            ping_interval: DEFAULT_PING_INTERVAL,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
            queue_depth: 1024,
        }
    }
}

impl ServerConfig {
    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wait before renegotiating after the peer connection dropped
    pub reconnect_delay: Duration,
    /// Upper bound of the random extra wait added to each retry, so two
    /// sides that lost the link together do not offer at the same instant
    pub reconnect_jitter: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            reconnect_jitter: DEFAULT_RECONNECT_JITTER,
        }
    }
}
