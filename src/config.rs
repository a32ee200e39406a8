use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Runtime configuration for the supervisor and its HTTP surface.
///
/// Defaults mirror the fixed invocation contract of the proxy child:
/// `tun-proxy <ipv6/prefix> <send-port> <recv-port>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP control/query surface binds to. All interfaces by
    /// default so a dashboard on another origin can reach it.
    pub bind: IpAddr,
    /// Port the HTTP control/query surface listens on
    pub http_port: u16,
    /// Path to the tun-proxy binary
    pub proxy_bin: PathBuf,
    /// IPv6 address/prefix handed to the child as its first argument
    pub tunnel_addr: String,
    /// Local UDP send port (second child argument)
    pub send_port: u16,
    /// Remote UDP receive port (third child argument)
    pub recv_port: u16,
    /// Interface name the child creates
    pub iface: String,
    /// Number of log entries in the recent window used for push notification
    pub log_retention: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: 4000,
            proxy_bin: PathBuf::from("tun-proxy"),
            tunnel_addr: "2001:db8::10/64".to_string(),
            send_port: 5000,
            recv_port: 5001,
            iface: "tun0".to_string(),
            log_retention: 300,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = toml::from_str(&raw)?;
        Ok(config)
    }
}
