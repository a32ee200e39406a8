//! Wire types pushed to dashboard observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Stdout,
    Stderr,
    Packet,
    Error,
}

/// Structured payload extracted from a `packet-meta` marker line.
///
/// Field names match the child's JSON output verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketMeta {
    pub src: String,
    pub dst: String,
    pub proto: String,
    pub size: u64,
}

/// One log record as seen by observers. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PacketMeta>,
}

impl LogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>, meta: Option<PacketMeta>) -> Self {
        Self {
            kind,
            message: message.into(),
            ts: Utc::now(),
            meta,
        }
    }
}

/// Owned copy of the cumulative traffic counters.
///
/// Counters are monotonically non-decreasing for the lifetime of the
/// supervisor process; a tunnel stop/start does not reset them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub packets_in: u64,
    pub packets_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}
