//! Recording session phases and the shared status handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Phase of a recording session lifecycle.
///
/// `Completed`, `Failed` and `Cancelled` are terminal; a session never
/// returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Requesting,
    Recording,
    Stopping,
    Completed,
    Failed,
    Cancelled,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Current session state, readable by API handlers.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub session_id: Option<Uuid>,
    pub meeting_id: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub chunks_delivered: u64,
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            session_id: None,
            meeting_id: None,
            started_at: None,
            chunks_delivered: 0,
            last_error: None,
        }
    }
}

impl SessionState {
    /// Duration since capture began, in seconds.
    pub fn duration_seconds(&self) -> Option<u64> {
        self.started_at.map(|started| {
            let elapsed = Utc::now() - started;
            elapsed.num_seconds().max(0) as u64
        })
    }
}

/// What a `stop()` call should do, decided atomically against the
/// session phase.
#[derive(Debug)]
pub(crate) enum StopDecision {
    /// Access request still pending; it has been flagged for abandonment.
    Cancel,
    /// Capture is live; the phase is now `Stopping` and the caller owns
    /// the teardown.
    Stop,
    /// Nothing to stop in this phase.
    Reject(SessionPhase),
}

/// Thread-safe handle for sharing session state between the controller
/// and API handlers.
#[derive(Clone, Default)]
pub struct SessionStatusHandle {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionStatusHandle {
    pub async fn get(&self) -> SessionState {
        self.inner.lock().await.clone()
    }

    /// `Idle -> Requesting`. Fails with the current phase if the session
    /// was already started.
    pub(crate) async fn begin(
        &self,
        meeting_id: i64,
        session_id: Uuid,
    ) -> Result<(), SessionPhase> {
        let mut state = self.inner.lock().await;
        if state.phase != SessionPhase::Idle {
            return Err(state.phase);
        }
        state.phase = SessionPhase::Requesting;
        state.meeting_id = Some(meeting_id);
        state.session_id = Some(session_id);
        state.last_error = None;
        Ok(())
    }

    /// `Requesting -> Recording`, unless a cancellation won the race.
    /// Shares the state lock with [`Self::decide_stop`], so a grant and a
    /// concurrent stop agree on exactly one outcome.
    pub(crate) async fn try_begin_recording(&self, cancel: &CancellationToken) -> bool {
        let mut state = self.inner.lock().await;
        if cancel.is_cancelled() || state.phase != SessionPhase::Requesting {
            return false;
        }
        state.phase = SessionPhase::Recording;
        state.started_at = Some(Utc::now());
        true
    }

    pub(crate) async fn decide_stop(&self, cancel: &CancellationToken) -> StopDecision {
        let mut state = self.inner.lock().await;
        match state.phase {
            SessionPhase::Requesting => {
                cancel.cancel();
                StopDecision::Cancel
            }
            SessionPhase::Recording => {
                state.phase = SessionPhase::Stopping;
                StopDecision::Stop
            }
            phase => StopDecision::Reject(phase),
        }
    }

    pub(crate) async fn completed(&self) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Completed;
    }

    pub(crate) async fn cancelled(&self) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Cancelled;
    }

    pub(crate) async fn failed(&self, error: String) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Failed;
        state.last_error = Some(error);
    }

    /// Fail the session only if capture is still live. Lets the fault
    /// watcher lose gracefully against an in-flight `stop()`.
    pub(crate) async fn fail_if_recording(&self, error: String) -> bool {
        let mut state = self.inner.lock().await;
        if state.phase != SessionPhase::Recording {
            return false;
        }
        state.phase = SessionPhase::Failed;
        state.last_error = Some(error);
        true
    }

    pub(crate) async fn set_chunks_delivered(&self, chunks: u64) {
        let mut state = self.inner.lock().await;
        state.chunks_delivered = chunks;
    }

    /// Return the handle to `Idle` so a fresh session can adopt it.
    /// Only meaningful once the previous session is terminal.
    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        *state = SessionState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_phase_as_str() {
        assert_eq!(SessionPhase::Idle.as_str(), "idle");
        assert_eq!(SessionPhase::Requesting.as_str(), "requesting");
        assert_eq!(SessionPhase::Recording.as_str(), "recording");
        assert_eq!(SessionPhase::Stopping.as_str(), "stopping");
        assert_eq!(SessionPhase::Completed.as_str(), "completed");
        assert_eq!(SessionPhase::Failed.as_str(), "failed");
        assert_eq!(SessionPhase::Cancelled.as_str(), "cancelled");
    }

    #[test]
    fn test_terminal_phases() {
        assert!(SessionPhase::Completed.is_terminal());
        assert!(SessionPhase::Failed.is_terminal());
        assert!(SessionPhase::Cancelled.is_terminal());
        assert!(!SessionPhase::Idle.is_terminal());
        assert!(!SessionPhase::Recording.is_terminal());
        assert!(!SessionPhase::Stopping.is_terminal());
    }

    #[test]
    fn test_session_phase_serialization() {
        let json = serde_json::to_string(&SessionPhase::Recording).unwrap();
        assert_eq!(json, "\"recording\"");

        let parsed: SessionPhase = serde_json::from_str("\"stopping\"").unwrap();
        assert_eq!(parsed, SessionPhase::Stopping);
    }

    #[test]
    fn test_session_state_default() {
        let state = SessionState::default();
        assert_eq!(state.phase, SessionPhase::Idle);
        assert!(state.session_id.is_none());
        assert!(state.meeting_id.is_none());
        assert!(state.started_at.is_none());
        assert_eq!(state.chunks_delivered, 0);
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn test_begin_only_from_idle() {
        let handle = SessionStatusHandle::default();
        let id = Uuid::new_v4();

        handle.begin(7, id).await.unwrap();
        let state = handle.get().await;
        assert_eq!(state.phase, SessionPhase::Requesting);
        assert_eq!(state.meeting_id, Some(7));
        assert_eq!(state.session_id, Some(id));

        assert_eq!(
            handle.begin(8, Uuid::new_v4()).await,
            Err(SessionPhase::Requesting)
        );
    }

    #[tokio::test]
    async fn test_grant_loses_to_cancel() {
        let handle = SessionStatusHandle::default();
        handle.begin(1, Uuid::new_v4()).await.unwrap();

        let cancel = CancellationToken::new();
        assert!(matches!(
            handle.decide_stop(&cancel).await,
            StopDecision::Cancel
        ));
        assert!(cancel.is_cancelled());
        assert!(!handle.try_begin_recording(&cancel).await);
    }

    #[tokio::test]
    async fn test_stop_decision_flips_recording_to_stopping() {
        let handle = SessionStatusHandle::default();
        handle.begin(1, Uuid::new_v4()).await.unwrap();

        let cancel = CancellationToken::new();
        assert!(handle.try_begin_recording(&cancel).await);
        assert!(handle.get().await.started_at.is_some());

        assert!(matches!(
            handle.decide_stop(&cancel).await,
            StopDecision::Stop
        ));
        assert_eq!(handle.get().await.phase, SessionPhase::Stopping);

        // a second stop finds nothing left to do
        assert!(matches!(
            handle.decide_stop(&cancel).await,
            StopDecision::Reject(SessionPhase::Stopping)
        ));
    }

    #[tokio::test]
    async fn test_fail_if_recording_ignores_other_phases() {
        let handle = SessionStatusHandle::default();
        assert!(!handle.fail_if_recording("lost".to_string()).await);
        assert_eq!(handle.get().await.phase, SessionPhase::Idle);

        handle.begin(1, Uuid::new_v4()).await.unwrap();
        let cancel = CancellationToken::new();
        handle.try_begin_recording(&cancel).await;

        assert!(handle.fail_if_recording("lost".to_string()).await);
        let state = handle.get().await;
        assert_eq!(state.phase, SessionPhase::Failed);
        assert_eq!(state.last_error, Some("lost".to_string()));
    }
}
