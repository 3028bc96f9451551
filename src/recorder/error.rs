//! Recording session error types.

use std::time::Duration;
use thiserror::Error;

use super::capture::DeviceError;

/// Failure to persist the final recording outcome to the meeting record.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("meeting status update failed: {0}")]
    UpdateFailed(String),

    #[error("meeting status update timed out after {0:?}")]
    TimedOut(Duration),

    #[error("meeting status update not confirmed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Errors surfaced by the session contract itself.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `start()` on a session that already left `Idle`. Sessions are
    /// single-use; a new recording needs a new session.
    #[error("recording session already started (phase: {0})")]
    AlreadyStarted(&'static str),

    /// `stop()` in a phase with nothing to stop.
    #[error("cannot stop recording session in phase {0}")]
    InvalidState(&'static str),

    /// The session was abandoned before the device grant resolved.
    #[error("recording session cancelled before capture began")]
    Cancelled,

    #[error(transparent)]
    Device(#[from] DeviceError),
}
