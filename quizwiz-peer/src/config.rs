//! Binary configuration. Defaults, then environment, then command line.

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::warn;

/// Default host listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9000";

/// Host settings.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Address the WebSocket listener binds.
    pub bind_addr: SocketAddr,
    /// Quiz store file.
    pub store_path: PathBuf,
    /// Base URL advertised in join links.
    pub join_base_url: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            store_path: PathBuf::from("quizzes.json"),
            join_base_url: "http://localhost:9000/".to_string(),
        }
    }
}

impl HostConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("QUIZWIZ_BIND_ADDR")
                .ok()
                .and_then(|v| match v.parse() {
                    Ok(addr) => Some(addr),
                    Err(e) => {
                        warn!("Ignoring QUIZWIZ_BIND_ADDR={}: {}", v, e);
                        None
                    }
                })
                .unwrap_or(defaults.bind_addr),
            store_path: std::env::var("QUIZWIZ_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            join_base_url: std::env::var("QUIZWIZ_JOIN_BASE_URL")
                .unwrap_or(defaults.join_base_url),
        }
    }
}

/// Participant settings.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// WebSocket URL of the host, without the code path.
    pub host_url: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            host_url: "ws://127.0.0.1:9000".to_string(),
        }
    }
}

impl PlayerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host_url: std::env::var("QUIZWIZ_HOST_URL")
                .unwrap_or_else(|_| Self::default().host_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let host = HostConfig::default();
        assert_eq!(host.bind_addr, DEFAULT_BIND_ADDR.parse::<SocketAddr>().unwrap());
        assert_eq!(host.store_path, PathBuf::from("quizzes.json"));
        assert!(PlayerConfig::default().host_url.starts_with("ws://"));
    }
}
