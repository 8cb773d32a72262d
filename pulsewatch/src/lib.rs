//! Pulsewatch - listener state tracking and liveness probing
//!
//! This library provides two independent components that together support
//! end-to-end observability scenarios against an external event source and
//! a monitored remote process:
//!
//! - [`registry`] - tracks the connection state of a registered event
//!   listener, ingests posted/removed/ranking events behind a source
//!   allow-list, and serves consistent interception snapshots to any thread.
//! - [`heartbeat`] - runs a countdown of liveness ticks against a remote
//!   callback, treats delivery failure as the death signal, and reports a
//!   consolidated final status to a supervising waiter.
//!
//! # Example
//!
//! ```ignore
//! use pulsewatch::heartbeat::{HeartbeatMonitor, ProbeSpec};
//!
//! let monitor = HeartbeatMonitor::with_defaults();
//! let (tx, mut rx) = tokio::sync::mpsc::channel(1);
//! monitor.monitor(tx);
//! monitor.trigger(spec, callback);
//! let status = rx.recv().await;
//! ```

pub mod heartbeat;
pub mod logging;
pub mod registry;

/// Version of the pulsewatch library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
