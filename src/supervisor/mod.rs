//! Child process lifecycle and pipeline wiring.
//!
//! The supervisor owns exactly one tracked child at a time. Its output
//! streams are pumped chunk-wise through the classifier into the telemetry
//! store in arrival order; all mutation of shared state goes through this
//! module (single-writer discipline), readers only ever get snapshots.

mod state;

pub use state::TunnelStatus;

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::telemetry::classifier::{classify_chunk, StreamSource};
use crate::telemetry::{LogKind, TelemetryStore};

use state::ActiveRun;

pub struct Supervisor {
    config: Config,
    store: Arc<TelemetryStore>,
    run: Arc<RwLock<Option<ActiveRun>>>,
    next_generation: AtomicU64,
}

impl Supervisor {
    pub fn new(config: Config, store: Arc<TelemetryStore>) -> Self {
        Self {
            config,
            store,
            run: Arc::new(RwLock::new(None)),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> Arc<TelemetryStore> {
        Arc::clone(&self.store)
    }

    pub async fn is_running(&self) -> bool {
        self.run.read().await.is_some()
    }

    /// Spawn the proxy child and wire its output into the telemetry store.
    ///
    /// Fails with [`Error::AlreadyRunning`] while a child is tracked. The
    /// spawned child is invoked with the fixed argument contract
    /// `<tunnel_addr> <send_port> <recv_port>`.
    pub async fn start(&self) -> Result<()> {
        let mut run = self.run.write().await;
        if run.is_some() {
            return Err(Error::AlreadyRunning);
        }

        self.store
            .record(LogKind::Info, "Starting tunnel...", None)
            .await;

        let mut child = Command::new(&self.config.proxy_bin)
            .arg(&self.config.tunnel_addr)
            .arg(self.config.send_port.to_string())
            .arg(self.config.recv_port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let Some(pid) = child.id() else {
            return Err(Error::Io(std::io::Error::other(
                "child exited before its pid could be read",
            )));
        };
        info!(pid, bin = %self.config.proxy_bin.display(), "tunnel child spawned");

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_stream(stdout, StreamSource::Stdout, self.store()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_stream(stderr, StreamSource::Stderr, self.store()));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        *run = Some(ActiveRun {
            generation,
            pid,
            started_at: Utc::now(),
        });

        // The wait task owns the child handle. On exit it always records an
        // error entry, but only clears state if this run is still current.
        let store = self.store();
        let run_slot = Arc::clone(&self.run);
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(err) => {
                    warn!(%err, "failed to wait for tunnel child");
                    None
                }
            };
            let code_text = match code {
                Some(code) => code.to_string(),
                None => "null".to_string(),
            };
            store
                .record(
                    LogKind::Error,
                    format!("Process exited with code {code_text}"),
                    None,
                )
                .await;

            let mut run = run_slot.write().await;
            if run.as_ref().map(|r| r.generation) == Some(generation) {
                *run = None;
            }
        });

        Ok(())
    }

    /// Signal the tracked child with SIGTERM and clear state immediately.
    ///
    /// Fire-and-forget: does not wait for the child to exit. The eventual
    /// exit is still observed by the wait task and surfaced as a log entry.
    pub async fn stop(&self) -> Result<()> {
        let mut run = self.run.write().await;
        let Some(active) = run.take() else {
            return Err(Error::NotRunning);
        };

        self.store
            .record(LogKind::Info, "Stopping tunnel...", None)
            .await;

        if let Err(err) = signal::kill(Pid::from_raw(active.pid as i32), Signal::SIGTERM) {
            warn!(%err, pid = active.pid, "failed to signal tunnel child");
        }
        Ok(())
    }

    /// Status snapshot, or `None` when no child is tracked.
    pub async fn status(&self) -> Option<TunnelStatus> {
        let run = self.run.read().await;
        run.as_ref().map(|active| TunnelStatus {
            ok: true,
            running: true,
            pid: active.pid,
            iface: self.config.iface.clone(),
            ipv6: self.config.tunnel_addr.clone(),
            send_port: self.config.send_port,
            recv_port: self.config.recv_port,
            uptime: (Utc::now() - active.started_at).num_seconds().max(0) as u64,
        })
    }
}

/// Pump one child stream chunk-wise into the store in arrival order.
///
/// Chunks are read raw rather than line-buffered: the child writes a packet
/// line and its meta line together, and classification must see them as one
/// unit when they arrive as one.
async fn pump_stream(
    mut stream: impl AsyncRead + Unpin,
    source: StreamSource,
    store: Arc<TelemetryStore>,
) {
    let mut buf = [0u8; 8192];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                store.record_classified(classify_chunk(&text, source)).await;
            }
            Err(err) => {
                debug!(?source, %err, "tunnel output stream closed");
                break;
            }
        }
    }
}
