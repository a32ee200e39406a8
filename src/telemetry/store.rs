//! Aggregated telemetry state: one append-only log history with a bounded
//! recent-window view, plus cumulative traffic counters.
//!
//! The recent window is derived from the canonical history via the retention
//! parameter rather than maintained as a second structure, so the two views
//! cannot drift. All accessors return owned snapshots.

use tokio::sync::RwLock;

use super::classifier::Classified;
use super::event::{LogEntry, LogKind, MetricsSnapshot, PacketMeta};

pub const DEFAULT_RETENTION: usize = 300;

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<LogEntry>,
    metrics: MetricsSnapshot,
}

#[derive(Debug)]
pub struct TelemetryStore {
    retention: usize,
    inner: RwLock<Inner>,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl TelemetryStore {
    pub fn new(retention: usize) -> Self {
        Self {
            retention,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Append one log entry. Never fails; the store is the terminal sink of
    /// the pipeline.
    pub async fn record(&self, kind: LogKind, message: impl Into<String>, meta: Option<PacketMeta>) {
        let mut inner = self.inner.write().await;
        inner.entries.push(LogEntry::new(kind, message, meta));
    }

    /// Apply one classified chunk: bump counters and materialize the entry.
    pub async fn record_classified(&self, classified: Classified) {
        let mut inner = self.inner.write().await;
        inner.metrics.packets_in += classified.packets_in;
        inner.metrics.packets_out += classified.packets_out;
        inner.metrics.bytes_in += classified.bytes_in;
        inner.metrics.bytes_out += classified.bytes_out;
        inner
            .entries
            .push(LogEntry::new(classified.kind, classified.message, classified.meta));
    }

    /// The most recently appended entry, if any.
    pub async fn latest(&self) -> Option<LogEntry> {
        self.inner.read().await.entries.last().cloned()
    }

    /// The recent window: at most `retention` newest entries, oldest first.
    pub async fn recent(&self) -> Vec<LogEntry> {
        let inner = self.inner.read().await;
        let start = inner.entries.len().saturating_sub(self.retention);
        inner.entries[start..].to_vec()
    }

    /// Total number of entries ever recorded. The serving path only reads
    /// the recent window; the full history is kept as the canonical record
    /// and observed here by tests.
    pub(crate) async fn history_len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Owned copy of the current counters.
    pub async fn snapshot_metrics(&self) -> MetricsSnapshot {
        self.inner.read().await.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::classifier::{classify_chunk, StreamSource};

    #[tokio::test]
    async fn recent_window_is_bounded_while_history_grows() {
        let store = TelemetryStore::new(3);
        for i in 0..10 {
            store.record(LogKind::Stdout, format!("line {i}"), None).await;
        }
        assert_eq!(store.history_len().await, 10);

        let recent = store.recent().await;
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].message, "line 7");
        assert_eq!(recent[2].message, "line 9");
        assert_eq!(store.latest().await.unwrap().message, "line 9");
    }

    #[tokio::test]
    async fn empty_store_has_no_latest() {
        let store = TelemetryStore::default();
        assert!(store.latest().await.is_none());
        assert!(store.recent().await.is_empty());
    }

    #[tokio::test]
    async fn classified_chunks_accumulate_counters() {
        let store = TelemetryStore::default();
        store
            .record_classified(classify_chunk(
                "→ Packet da TUN (1500 bytes)",
                StreamSource::Stdout,
            ))
            .await;
        store
            .record_classified(classify_chunk(
                "← Packet from UDP (64 bytes)",
                StreamSource::Stdout,
            ))
            .await;
        store
            .record_classified(classify_chunk(
                "→ Packet da TUN (?? bytes)",
                StreamSource::Stdout,
            ))
            .await;

        let metrics = store.snapshot_metrics().await;
        assert_eq!(metrics.packets_in, 2);
        assert_eq!(metrics.bytes_in, 1500);
        assert_eq!(metrics.packets_out, 1);
        assert_eq!(metrics.bytes_out, 64);
        assert_eq!(store.history_len().await, 3);
    }

    #[tokio::test]
    async fn snapshot_is_a_copy_not_a_live_view() {
        let store = TelemetryStore::default();
        let before = store.snapshot_metrics().await;
        store
            .record_classified(classify_chunk(
                "→ Packet da TUN (10 bytes)",
                StreamSource::Stdout,
            ))
            .await;
        assert_eq!(before.packets_in, 0);
        assert_eq!(store.snapshot_metrics().await.packets_in, 1);
    }
}
