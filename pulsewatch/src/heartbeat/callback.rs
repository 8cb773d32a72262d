//! The remote callback channel and the monitor's final-status payload.

use thiserror::Error;

/// Delivery failure on the remote heartbeat channel.
///
/// Raised by [`HeartbeatCallback::on_heartbeat`] when the remote side is
/// unreachable. This is the liveness signal: the tick loop interprets it as
/// "the target died" and terminates the session.
#[derive(Debug, Error)]
#[error("heartbeat delivery failed: {0}")]
pub struct CallbackError(String);

impl CallbackError {
    /// A broken-channel failure with a describing message.
    pub fn channel_broken(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Interface exposed to the target process.
///
/// Implementations relay each tick across the process boundary. They must
/// be cheap to call from the tick task and must report delivery failure
/// rather than panicking.
pub trait HeartbeatCallback: Send + Sync {
    /// Deliver one tick with the remaining countdown value.
    fn on_heartbeat(&self, remaining: u32) -> Result<(), CallbackError>;
}

/// Consolidated final status reported to the supervising monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalStatus {
    /// Pid of the probed process.
    pub pid: u32,
    /// Uid of the probed process.
    pub uid: u32,
    /// Name of the probed process.
    pub process_name: String,
    /// Whether heartbeat delivery failed before the countdown exhausted.
    pub died: bool,
}
