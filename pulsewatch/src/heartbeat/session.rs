//! Heartbeat session handle and outcome types.

use std::time::Duration;

use tokio::sync::watch;

use super::callback::FinalStatus;

/// Parameters for one liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    /// Pid of the target process.
    pub pid: u32,
    /// Uid of the target process.
    pub uid: u32,
    /// Name of the target process.
    pub process_name: String,
    /// Number of ticks to deliver (first tick carries this value).
    pub countdown: u32,
    /// Sleep between ticks.
    pub interval: Duration,
}

/// Where a session ended up.
///
/// Once a session leaves [`TerminalState::Running`] all of its fields are
/// frozen; the completion signal's release is sequenced after those writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    /// The tick loop is still counting down.
    Running,
    /// The countdown exhausted normally.
    Completed,
    /// Heartbeat delivery failed; the target is presumed dead.
    TargetDied,
    /// The session was cancelled before the countdown exhausted.
    Cancelled,
}

impl TerminalState {
    /// Returns a string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalState::Running => "running",
            TerminalState::Completed => "completed",
            TerminalState::TargetDied => "target-died",
            TerminalState::Cancelled => "cancelled",
        }
    }
}

/// Final disposition of a session: terminal state plus reportable status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// How the tick loop ended.
    pub terminal: TerminalState,
    /// The status the monitor reports to its result channel.
    pub status: FinalStatus,
}

/// Handle to a triggered heartbeat session.
///
/// The tick loop runs detached; this handle observes its completion signal.
pub struct HeartbeatSession {
    spec: ProbeSpec,
    completion: watch::Receiver<Option<SessionOutcome>>,
}

impl HeartbeatSession {
    pub(crate) fn new(spec: ProbeSpec, completion: watch::Receiver<Option<SessionOutcome>>) -> Self {
        Self { spec, completion }
    }

    /// The parameters this session was triggered with.
    pub fn spec(&self) -> &ProbeSpec {
        &self.spec
    }

    /// Current terminal state; [`TerminalState::Running`] until the
    /// completion signal is released.
    pub fn terminal_state(&self) -> TerminalState {
        self.completion
            .borrow()
            .as_ref()
            .map(|outcome| outcome.terminal)
            .unwrap_or(TerminalState::Running)
    }

    /// Whether the session has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.terminal_state() != TerminalState::Running
    }

    /// Wait for the session to finish and return its outcome.
    ///
    /// Returns `None` only if the session task was torn down without ever
    /// releasing the completion signal.
    pub async fn outcome(&mut self) -> Option<SessionOutcome> {
        match self.completion.wait_for(|o| o.is_some()).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        }
    }
}
