//! Observable tunnel state.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// State of the currently tracked child run. Only exists while a child is
/// tracked, which makes "pid and start time are set iff running" structural.
#[derive(Debug, Clone)]
pub(super) struct ActiveRun {
    /// Distinguishes exits of stale children from the current run
    pub generation: u64,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

/// Point-in-time status snapshot returned to callers while running.
#[derive(Debug, Clone, Serialize)]
pub struct TunnelStatus {
    pub ok: bool,
    pub running: bool,
    pub pid: u32,
    pub iface: String,
    pub ipv6: String,
    #[serde(rename = "sendPort")]
    pub send_port: u16,
    #[serde(rename = "recvPort")]
    pub recv_port: u16,
    /// Seconds since the child was spawned, derived at snapshot time
    pub uptime: u64,
}
