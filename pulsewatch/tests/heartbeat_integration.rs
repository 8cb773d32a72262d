//! Integration tests for the heartbeat monitor.
//!
//! Drives full supervisor-side scenarios: trigger a countdown against a
//! recording callback, watch the done broadcast, and verify the final
//! status a monitor waiter receives for the interesting interleavings.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use pulsewatch::heartbeat::{
    CallbackError, FinalStatus, HeartbeatCallback, HeartbeatMonitor, ProbeSpec, TerminalState,
};

/// Callback that records every delivered tick and can be told to start
/// failing at a specific remaining count.
struct RecordingCallback {
    ticks: Mutex<Vec<u32>>,
    fail_at: Option<u32>,
}

impl RecordingCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            ticks: Mutex::new(Vec::new()),
            fail_at: None,
        })
    }

    fn failing_at(tick: u32) -> Arc<Self> {
        Arc::new(Self {
            ticks: Mutex::new(Vec::new()),
            fail_at: Some(tick),
        })
    }

    fn ticks(&self) -> Vec<u32> {
        self.ticks.lock().expect("tick lock").clone()
    }
}

impl HeartbeatCallback for RecordingCallback {
    fn on_heartbeat(&self, remaining: u32) -> Result<(), CallbackError> {
        self.ticks.lock().expect("tick lock").push(remaining);
        match self.fail_at {
            Some(fail_at) if remaining == fail_at => {
                Err(CallbackError::channel_broken("binder transaction failed"))
            }
            _ => Ok(()),
        }
    }
}

fn app_spec(countdown: u32, interval: Duration) -> ProbeSpec {
    ProbeSpec {
        pid: 100,
        uid: 7,
        process_name: "app".to_string(),
        countdown,
        interval,
    }
}

/// The spec's example scenario: countdown 3 at 10ms with a healthy
/// callback delivers 3, 2, 1, one done broadcast, and a final status with
/// `died = false`.
#[tokio::test]
async fn healthy_probe_end_to_end() {
    let monitor = HeartbeatMonitor::with_defaults();
    let callback = RecordingCallback::new();
    let mut done_rx = monitor.subscribe_done();
    let (result_tx, mut result_rx) = mpsc::channel(1);

    // Monitor first, trigger second: the waiter must be unblocked later.
    monitor.monitor(result_tx);
    let session = monitor
        .trigger(app_spec(3, Duration::from_millis(10)), callback.clone())
        .expect("first trigger");

    let status = result_rx.recv().await.expect("status reported");
    assert_eq!(
        status,
        FinalStatus {
            pid: 100,
            uid: 7,
            process_name: "app".to_string(),
            died: false,
        }
    );
    assert_eq!(callback.ticks(), vec![3, 2, 1]);
    assert!(done_rx.recv().await.is_ok());
    assert_eq!(session.terminal_state(), TerminalState::Completed);
}

/// The spec's failure scenario: the callback throws on the second tick, so
/// no tick with argument 1 occurs and the status reports `died = true`.
#[tokio::test]
async fn dead_target_detected_mid_countdown() {
    let monitor = HeartbeatMonitor::with_defaults();
    let callback = RecordingCallback::failing_at(2);
    let (result_tx, mut result_rx) = mpsc::channel(1);

    monitor.monitor(result_tx);
    monitor
        .trigger(app_spec(3, Duration::from_millis(10)), callback.clone())
        .expect("first trigger");

    let status = result_rx.recv().await.expect("status reported");
    assert!(status.died);
    assert_eq!(status.process_name, "app");
    assert_eq!(callback.ticks(), vec![3, 2]);
}

/// Monitor called only after the session already finished must still
/// receive the final status.
#[tokio::test]
async fn late_monitor_still_sees_final_status() {
    let monitor = HeartbeatMonitor::with_defaults();

    let mut session = monitor
        .trigger(app_spec(2, Duration::from_millis(2)), RecordingCallback::new())
        .expect("first trigger");
    let outcome = session.outcome().await.expect("outcome released");
    assert_eq!(outcome.terminal, TerminalState::Completed);

    let (result_tx, mut result_rx) = mpsc::channel(1);
    monitor.monitor(result_tx);

    let status = tokio::time::timeout(Duration::from_secs(1), result_rx.recv())
        .await
        .expect("monitor must not hang after completion")
        .expect("status reported");
    assert_eq!(status.pid, 100);
    assert!(!status.died);
}

/// Several monitor waiters attached at different times all see the same
/// final values the trigger loop established.
#[tokio::test]
async fn monitor_result_is_consistent_across_interleavings() {
    let monitor = HeartbeatMonitor::with_defaults();

    // Before trigger.
    let (early_tx, mut early_rx) = mpsc::channel(1);
    monitor.monitor(early_tx);

    let mut session = monitor
        .trigger(
            app_spec(4, Duration::from_millis(5)),
            RecordingCallback::failing_at(3),
        )
        .expect("first trigger");

    // During the countdown.
    let (mid_tx, mut mid_rx) = mpsc::channel(1);
    monitor.monitor(mid_tx);

    session.outcome().await.expect("outcome released");

    // After completion.
    let (late_tx, mut late_rx) = mpsc::channel(1);
    monitor.monitor(late_tx);

    let expected = FinalStatus {
        pid: 100,
        uid: 7,
        process_name: "app".to_string(),
        died: true,
    };
    assert_eq!(early_rx.recv().await.expect("early status"), expected);
    assert_eq!(mid_rx.recv().await.expect("mid status"), expected);
    assert_eq!(late_rx.recv().await.expect("late status"), expected);
}

/// Cancelling a session mid-countdown still releases the completion signal
/// so the monitor waiter does not hang, and reports `died = false`.
#[tokio::test]
async fn cancellation_releases_waiters_without_death() {
    let monitor = HeartbeatMonitor::with_defaults();
    let callback = RecordingCallback::new();
    let (result_tx, mut result_rx) = mpsc::channel(1);

    monitor.monitor(result_tx);
    let session = monitor
        .trigger(app_spec(10, Duration::from_secs(60)), callback.clone())
        .expect("first trigger");

    monitor.cancellation_token().cancel();

    let status = tokio::time::timeout(Duration::from_secs(1), result_rx.recv())
        .await
        .expect("cancellation must release the completion signal")
        .expect("status reported");
    assert!(!status.died);
    assert_eq!(session.terminal_state(), TerminalState::Cancelled);
    assert!(callback.ticks().is_empty());
}
