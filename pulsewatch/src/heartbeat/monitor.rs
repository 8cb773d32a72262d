//! The heartbeat monitor: tick loop, done broadcast, and status reporting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::callback::{FinalStatus, HeartbeatCallback};
use super::session::{HeartbeatSession, ProbeSpec, SessionOutcome, TerminalState};

/// Well-known topic name for the self-termination broadcast.
///
/// The target process subscribes under this topic and, on receipt,
/// terminates its own process unconditionally.
pub const HEARTBEAT_DONE_TOPIC: &str = "pulsewatch/heartbeat-done";

/// Payload of the self-termination broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatDone {
    /// Pid of the probed process the broadcast is aimed at.
    pub pid: u32,
}

/// Configuration for [`HeartbeatMonitor`].
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Capacity of the done-broadcast channel.
    pub done_channel_capacity: usize,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            done_channel_capacity: 16,
        }
    }
}

/// Supervisor-side liveness prober.
///
/// One monitor drives one session: [`HeartbeatMonitor::trigger`] starts the
/// countdown tick loop in a background task, and
/// [`HeartbeatMonitor::monitor`] arranges for the final status to be sent
/// to a result channel once the session reaches a terminal state. Neither
/// call blocks the caller's thread.
pub struct HeartbeatMonitor {
    /// Broadcast for the target's self-termination signal.
    done_tx: broadcast::Sender<HeartbeatDone>,

    /// One-shot completion signal: released exactly once per session,
    /// sequenced after all of the tick loop's field writes.
    completion_tx: watch::Sender<Option<SessionOutcome>>,

    /// Set on the first `trigger` call; later calls are no-ops.
    triggered: AtomicBool,

    /// Cancels the tick loop's sleep for clean shutdown.
    cancel: CancellationToken,
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl HeartbeatMonitor {
    /// Create a new monitor with the given configuration.
    pub fn new(config: HeartbeatConfig) -> Self {
        let (done_tx, _) = broadcast::channel(config.done_channel_capacity);
        let (completion_tx, _) = watch::channel(None);

        Self {
            done_tx,
            completion_tx,
            triggered: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Create a monitor with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(HeartbeatConfig::default())
    }

    /// Token that cancels the running session's countdown.
    ///
    /// A cancelled session ends in [`TerminalState::Cancelled`] with
    /// `died = false` and still releases the completion signal, so no
    /// monitor waiter hangs. An uncancelled session runs until the
    /// countdown exhausts or the callback fails.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Subscribe to the self-termination broadcast.
    ///
    /// The target's execution context listens here and shuts itself down
    /// when a [`HeartbeatDone`] for its pid arrives.
    pub fn subscribe_done(&self) -> broadcast::Receiver<HeartbeatDone> {
        self.done_tx.subscribe()
    }

    /// Start the countdown tick loop in a background task.
    ///
    /// Each iteration sleeps `spec.interval`, then delivers the remaining
    /// count (`countdown, countdown - 1, ..., 1`) through `callback`. A
    /// delivery failure marks the session [`TerminalState::TargetDied`] and
    /// stops the loop immediately; no further ticks are attempted. After
    /// the loop ends the done broadcast is sent and the completion signal
    /// is released, in that order.
    ///
    /// One session per monitor: a second call is a logged no-op returning
    /// `None`.
    pub fn trigger(
        &self,
        spec: ProbeSpec,
        callback: Arc<dyn HeartbeatCallback>,
    ) -> Option<HeartbeatSession> {
        if self.triggered.swap(true, Ordering::SeqCst) {
            warn!(pid = spec.pid, "heartbeat session already triggered, ignoring");
            return None;
        }

        info!(
            pid = spec.pid,
            uid = spec.uid,
            process_name = %spec.process_name,
            countdown = spec.countdown,
            interval_ms = spec.interval.as_millis() as u64,
            "heartbeat countdown started"
        );

        let session = HeartbeatSession::new(spec.clone(), self.completion_tx.subscribe());

        let done_tx = self.done_tx.clone();
        let completion_tx = self.completion_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            Self::run_countdown(spec, callback, done_tx, completion_tx, cancel).await;
        });

        Some(session)
    }

    /// The countdown tick loop.
    async fn run_countdown(
        spec: ProbeSpec,
        callback: Arc<dyn HeartbeatCallback>,
        done_tx: broadcast::Sender<HeartbeatDone>,
        completion_tx: watch::Sender<Option<SessionOutcome>>,
        cancel: CancellationToken,
    ) {
        let mut terminal = TerminalState::Completed;
        let mut remaining = spec.countdown;

        while remaining > 0 {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(pid = spec.pid, remaining, "heartbeat countdown cancelled");
                    terminal = TerminalState::Cancelled;
                    break;
                }
                _ = tokio::time::sleep(spec.interval) => {}
            }

            if let Err(e) = callback.on_heartbeat(remaining) {
                warn!(
                    pid = spec.pid,
                    remaining,
                    error = %e,
                    "heartbeat delivery failed, target presumed dead"
                );
                terminal = TerminalState::TargetDied;
                break;
            }

            trace!(pid = spec.pid, remaining, "heartbeat delivered");
            remaining -= 1;
        }

        let status = FinalStatus {
            pid: spec.pid,
            uid: spec.uid,
            process_name: spec.process_name,
            died: terminal == TerminalState::TargetDied,
        };

        // Tell the target it may shut itself down. No subscribers is fine:
        // the target may already be gone.
        if done_tx.send(HeartbeatDone { pid: status.pid }).is_err() {
            debug!(
                topic = HEARTBEAT_DONE_TOPIC,
                pid = status.pid,
                "no subscribers for heartbeat-done broadcast"
            );
        }

        // Single release point for the completion signal, sequenced after
        // every field write above.
        let _ = completion_tx.send(Some(SessionOutcome { terminal, status }));

        info!(
            pid = spec.pid,
            terminal = terminal.as_str(),
            "heartbeat session finished"
        );
    }

    /// Arrange for the final status to be sent through `result_tx`.
    ///
    /// Spawns a background task that waits (unbounded) for the completion
    /// signal, then sends the [`FinalStatus`] as it stood when the tick
    /// loop exited. Send failure means the receiver is gone; it is logged
    /// and swallowed - this is best-effort notification, not guaranteed
    /// delivery. May be called before, during, or after `trigger`.
    pub fn monitor(&self, result_tx: mpsc::Sender<FinalStatus>) -> JoinHandle<()> {
        let mut completion_rx = self.completion_tx.subscribe();

        tokio::spawn(async move {
            let status = match completion_rx.wait_for(|outcome| outcome.is_some()).await {
                Ok(outcome) => match outcome.as_ref() {
                    Some(outcome) => outcome.status.clone(),
                    // wait_for only returns once the outcome is Some.
                    None => return,
                },
                Err(_) => {
                    debug!("heartbeat monitor ended without a completed session");
                    return;
                }
            };

            debug!(
                pid = status.pid,
                died = status.died,
                "reporting final heartbeat status"
            );
            if let Err(e) = result_tx.send(status).await {
                warn!(error = %e, "failed to deliver final heartbeat status (receiver gone)");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::CallbackError;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records delivered ticks; optionally fails from a given tick on.
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
                    Err(CallbackError::channel_broken("remote side gone"))
                }
                _ => Ok(()),
            }
        }
    }

    fn spec(countdown: u32) -> ProbeSpec {
        ProbeSpec {
            pid: 100,
            uid: 7,
            process_name: "app".to_string(),
            countdown,
            interval: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_countdown_delivers_exact_monotonic_sequence() {
        let monitor = HeartbeatMonitor::with_defaults();
        let callback = RecordingCallback::new();

        let mut session = monitor
            .trigger(spec(3), callback.clone())
            .expect("first trigger");
        let outcome = session.outcome().await.expect("outcome released");

        assert_eq!(callback.ticks(), vec![3, 2, 1]);
        assert_eq!(outcome.terminal, TerminalState::Completed);
        assert!(!outcome.status.died);
    }

    #[tokio::test]
    async fn test_callback_failure_stops_ticks_and_marks_died() {
        let monitor = HeartbeatMonitor::with_defaults();
        let callback = RecordingCallback::failing_at(2);

        let mut session = monitor
            .trigger(spec(3), callback.clone())
            .expect("first trigger");
        let outcome = session.outcome().await.expect("outcome released");

        assert_eq!(callback.ticks(), vec![3, 2]);
        assert_eq!(outcome.terminal, TerminalState::TargetDied);
        assert!(outcome.status.died);
    }

    #[tokio::test]
    async fn test_second_trigger_is_a_noop() {
        let monitor = HeartbeatMonitor::with_defaults();

        let first = monitor.trigger(spec(1), RecordingCallback::new());
        let second = monitor.trigger(spec(1), RecordingCallback::new());

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_done_broadcast_sent_exactly_once() {
        let monitor = HeartbeatMonitor::with_defaults();
        let mut done_rx = monitor.subscribe_done();

        let mut session = monitor
            .trigger(spec(2), RecordingCallback::new())
            .expect("first trigger");
        session.outcome().await.expect("outcome released");

        let done = done_rx.recv().await.expect("done broadcast");
        assert_eq!(done, HeartbeatDone { pid: 100 });
        assert!(matches!(
            done_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_session_reports_not_died() {
        let monitor = HeartbeatMonitor::with_defaults();
        let callback = RecordingCallback::new();

        let long_spec = ProbeSpec {
            interval: Duration::from_secs(30),
            ..spec(5)
        };
        let mut session = monitor
            .trigger(long_spec, callback.clone())
            .expect("first trigger");

        monitor.cancellation_token().cancel();
        let outcome = session.outcome().await.expect("outcome released");

        assert_eq!(outcome.terminal, TerminalState::Cancelled);
        assert!(!outcome.status.died);
        assert!(callback.ticks().is_empty());
    }

    #[tokio::test]
    async fn test_monitor_reports_final_status() {
        let monitor = HeartbeatMonitor::with_defaults();
        let (result_tx, mut result_rx) = mpsc::channel(1);

        monitor.monitor(result_tx);
        monitor
            .trigger(spec(2), RecordingCallback::new())
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
    }

    #[tokio::test]
    async fn test_monitor_after_completion_still_reports() {
        let monitor = HeartbeatMonitor::with_defaults();

        let mut session = monitor
            .trigger(spec(1), RecordingCallback::new())
            .expect("first trigger");
        session.outcome().await.expect("outcome released");

        let (result_tx, mut result_rx) = mpsc::channel(1);
        monitor.monitor(result_tx);

        let status = result_rx.recv().await.expect("status reported");
        assert_eq!(status.pid, 100);
    }

    #[tokio::test]
    async fn test_monitor_swallows_dropped_receiver() {
        let monitor = HeartbeatMonitor::with_defaults();
        let (result_tx, result_rx) = mpsc::channel(1);
        drop(result_rx);

        let reporter = monitor.monitor(result_tx);
        monitor
            .trigger(spec(1), RecordingCallback::new())
            .expect("first trigger");

        // The reporter must finish cleanly even though the receiver is gone.
        reporter.await.expect("reporter task panicked");
    }
}
