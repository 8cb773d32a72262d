//! Cross-process liveness probing.
//!
//! A supervisor starts a counting heartbeat against a target process: the
//! tick loop sleeps for the configured interval, delivers the remaining
//! count through a remote callback, and treats delivery failure as the
//! signal that the target died. When the countdown exhausts (or the target
//! dies, or the session is cancelled), a "heartbeat done" broadcast tells
//! the target it may self-terminate, and a one-shot completion signal
//! carries the final status to any waiting monitor.
//!
//! Callback failure is expected and domain-meaningful here - it is the
//! mechanism by which death is detected, not an error to propagate.

mod callback;
mod monitor;
mod session;

pub use callback::{CallbackError, FinalStatus, HeartbeatCallback};
pub use monitor::{HeartbeatConfig, HeartbeatDone, HeartbeatMonitor, HEARTBEAT_DONE_TOPIC};
pub use session::{HeartbeatSession, ProbeSpec, SessionOutcome, TerminalState};
