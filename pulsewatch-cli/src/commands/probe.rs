//! The `probe` command: run a heartbeat session against a local logging
//! callback and print the final status the monitor reports.
//!
//! This is the composition-root demo for the library: it wires a
//! [`HeartbeatMonitor`], a done-broadcast subscriber standing in for the
//! target's self-termination listener, and a monitor result channel.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::sync::mpsc;
use tracing::info;

use pulsewatch::heartbeat::{
    CallbackError, HeartbeatCallback, HeartbeatMonitor, ProbeSpec, HEARTBEAT_DONE_TOPIC,
};
use pulsewatch::logging;

use crate::error::CliError;

#[derive(Args)]
pub struct ProbeArgs {
    /// Pid to report in the final status (defaults to this process)
    #[arg(long)]
    pid: Option<u32>,

    /// Uid to report in the final status
    #[arg(long, default_value = "0")]
    uid: u32,

    /// Process name to report in the final status
    #[arg(long, default_value = "pulsewatch-probe")]
    process_name: String,

    /// Number of heartbeat ticks to deliver
    #[arg(long, default_value = "5")]
    countdown: u32,

    /// Interval between ticks in milliseconds
    #[arg(long, default_value = "1000")]
    interval_ms: u64,
}

/// Callback that logs each tick; never fails, so the probe reports a live
/// target unless cancelled externally.
struct LoggingCallback;

impl HeartbeatCallback for LoggingCallback {
    fn on_heartbeat(&self, remaining: u32) -> Result<(), CallbackError> {
        info!(remaining, "heartbeat tick");
        Ok(())
    }
}

pub async fn run(args: ProbeArgs) -> Result<(), CliError> {
    let _guard = logging::init_logging(logging::default_log_dir(), logging::default_log_file())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    if args.countdown == 0 {
        return Err(CliError::InvalidArgs(
            "countdown must be at least 1".to_string(),
        ));
    }

    let spec = ProbeSpec {
        pid: args.pid.unwrap_or_else(std::process::id),
        uid: args.uid,
        process_name: args.process_name,
        countdown: args.countdown,
        interval: Duration::from_millis(args.interval_ms),
    };

    let monitor = HeartbeatMonitor::with_defaults();
    let mut done_rx = monitor.subscribe_done();
    let (result_tx, mut result_rx) = mpsc::channel(1);

    monitor.monitor(result_tx);
    monitor
        .trigger(spec, Arc::new(LoggingCallback))
        .ok_or_else(|| CliError::Probe("session already triggered".to_string()))?;

    if let Ok(done) = done_rx.recv().await {
        println!(
            "Received '{}' broadcast for pid {}",
            HEARTBEAT_DONE_TOPIC, done.pid
        );
    }

    match result_rx.recv().await {
        Some(status) => {
            println!("Probe finished:");
            println!("  pid:          {}", status.pid);
            println!("  uid:          {}", status.uid);
            println!("  process name: {}", status.process_name);
            println!("  died:         {}", status.died);
            Ok(())
        }
        None => Err(CliError::Probe(
            "monitor ended without reporting a final status".to_string(),
        )),
    }
}
