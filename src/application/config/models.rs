use crate::common::constants::{
    DEFAULT_IDLE_TIMEOUT_MS, DEFAULT_SERVER_ADDRESS, DEFAULT_SERVER_PORT, DRAIN_BATCH,
    POLL_SPACE_INCREMENT,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// One of error, warn, info, debug
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub waiter: WaiterConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Poll waiter tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaiterConfig {
    /// Initial idle timeout in milliseconds
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Slots added each time the watch set fills up
    #[serde(default = "default_poll_space_increment")]
    pub poll_space_increment: usize,

    /// Handle references read from the submission channel per read
    #[serde(default = "default_drain_batch")]
    pub drain_batch: usize,

    /// Wake at least this often to expire idle handles; unset waits
    /// indefinitely
    #[serde(default)]
    pub sweep_interval_ms: Option<u64>,
}

fn default_idle_timeout_ms() -> u64 {
    DEFAULT_IDLE_TIMEOUT_MS
}

fn default_poll_space_increment() -> usize {
    POLL_SPACE_INCREMENT
}

fn default_drain_batch() -> usize {
    DRAIN_BATCH
}

impl WaiterConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_ms.map(Duration::from_millis)
    }
}

/// Echo server listener
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_address() -> IpAddr {
    DEFAULT_SERVER_ADDRESS
        .parse()
        .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST))
}

fn default_port() -> u16 {
    DEFAULT_SERVER_PORT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            waiter: WaiterConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
            poll_space_increment: default_poll_space_increment(),
            drain_batch: default_drain_batch(),
            sweep_interval_ms: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}
