//! Gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the Crosswire gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Seconds the peer may stay silent before it is considered dead.
    pub pong_timeout_secs: u64,
    /// Write deadline in seconds applied to every outbound frame.
    pub write_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            pong_timeout_secs: 60,
            write_timeout_secs: 60,
            max_message_size: 1024 * 1024, // 1 MiB
        }
    }
}

impl ServerConfig {
    /// Liveness timeout for inbound traffic.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    /// Deadline applied to each transport write.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Interval between outbound pings: 9/10 of the pong timeout, so a
    /// probe is always in flight before the peer's deadline expires.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_secs * 900)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_auto_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn default_timeouts() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.pong_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.write_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn ping_interval_is_nine_tenths_of_pong_timeout() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.ping_interval(), Duration::from_secs(54));

        let cfg = ServerConfig {
            pong_timeout_secs: 10,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.ping_interval(), Duration::from_secs(9));
    }

    #[test]
    fn default_max_message_size() {
        assert_eq!(ServerConfig::default().max_message_size, 1024 * 1024);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig {
            host: "0.0.0.0".into(),
            port: 9090,
            pong_timeout_secs: 30,
            write_timeout_secs: 15,
            max_message_size: 4096,
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, "0.0.0.0");
        assert_eq!(back.port, 9090);
        assert_eq!(back.pong_timeout_secs, 30);
        assert_eq!(back.write_timeout_secs, 15);
        assert_eq!(back.max_message_size, 4096);
    }
}
