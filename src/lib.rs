//! # Tunwarden
//!
//! Supervises a single TUN/UDP proxy child process and republishes its textual
//! output as two real-time feeds: a structured log stream and a cumulative
//! metrics stream, both served over SSE for a browser dashboard.
//!
//! ## Modules
//!
//! - `config` - Runtime configuration with TOML file loading
//! - `server` - HTTP control surface and SSE push endpoints
//! - `supervisor` - Child process lifecycle and pipeline wiring
//! - `telemetry` - Output classification and aggregated telemetry state
pub mod config;
pub mod error;
pub mod server;
pub mod supervisor;
pub mod telemetry;
