//! Telemetry pipeline: classification of raw child output into typed events
//! and the aggregated state derived from them.

pub mod classifier;
pub mod event;
pub mod store;

pub use classifier::{classify_chunk, Classified, StreamSource};
pub use event::{LogEntry, LogKind, MetricsSnapshot, PacketMeta};
pub use store::TelemetryStore;
