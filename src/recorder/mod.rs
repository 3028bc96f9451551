//! Audio recording: the session state machine and its collaborators.
//!
//! A session moves through
//! `Idle → Requesting → Recording → Stopping → Completed`, bailing to
//! `Failed` on device or sync trouble and to `Cancelled` when a stop
//! overtakes a pending access request.

pub mod capture;
pub mod error;
pub mod mic;
pub mod session;
pub mod spool;
pub mod status;

pub use capture::{AudioChunk, CaptureStream, ChunkSink, DeviceError, InputDevice};
pub use error::{SessionError, SyncError};
pub use mic::{MicCaptureStream, MicInputDevice};
pub use session::{SessionController, SessionOptions, StopOutcome, StopReport, SyncPolicy};
pub use status::{SessionPhase, SessionState, SessionStatusHandle};
