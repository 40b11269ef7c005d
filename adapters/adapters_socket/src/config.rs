//! Socket Configuration Module
//!
//! Tunables for the retry loop, multicast sends and datagram reception. Defaults
//! can be overridden per process through environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `SOCKET_SEND_RETRY_COUNT` | `send_retry_count` |
//! | `SOCKET_SEND_RETRY_WAIT_MS` | `send_retry_wait` |
//! | `SOCKET_MULTICAST_TTL` | `multicast_ttl` |
//! | `SOCKET_DGRAM_BUFFER_SIZE` | `datagram_buffer_size` |

use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

/// Retries allowed after a failed send before a write is abandoned
pub const DEFAULT_SEND_RETRY_COUNT: u32 = 10;
/// Pause between send retries
pub const DEFAULT_SEND_RETRY_WAIT: Duration = Duration::from_millis(20);
/// Hop limit applied to outgoing multicast datagrams
pub const DEFAULT_MULTICAST_TTL: u32 = 4;
/// Size of the datagram receive buffer
pub const DEFAULT_DATAGRAM_BUFFER_SIZE: usize = 512;

/// Socket tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfig {
    pub send_retry_count: u32,
    pub send_retry_wait: Duration,
    pub multicast_ttl: u32,
    pub datagram_buffer_size: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            send_retry_count: DEFAULT_SEND_RETRY_COUNT,
            send_retry_wait: DEFAULT_SEND_RETRY_WAIT,
            multicast_ttl: DEFAULT_MULTICAST_TTL,
            datagram_buffer_size: DEFAULT_DATAGRAM_BUFFER_SIZE,
        }
    }
}

impl SocketConfig {
    /// Defaults overridden by any valid `SOCKET_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Process-wide configuration, read from the environment once
    pub fn process_default() -> &'static SocketConfig {
        static CONFIG: OnceLock<SocketConfig> = OnceLock::new();
        CONFIG.get_or_init(SocketConfig::from_env)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(count) = parse_var::<u32>(&lookup, "SOCKET_SEND_RETRY_COUNT") {
            config.send_retry_count = count;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "SOCKET_SEND_RETRY_WAIT_MS") {
            config.send_retry_wait = Duration::from_millis(ms);
        }
        if let Some(ttl) = parse_var::<u32>(&lookup, "SOCKET_MULTICAST_TTL") {
            config.multicast_ttl = ttl;
        }
        match parse_var::<usize>(&lookup, "SOCKET_DGRAM_BUFFER_SIZE") {
            Some(0) => warn!("SOCKET_DGRAM_BUFFER_SIZE must be positive, keeping default"),
            Some(size) => config.datagram_buffer_size = size,
            None => {}
        }
        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring invalid socket configuration value");
            None
        }
    }
}
