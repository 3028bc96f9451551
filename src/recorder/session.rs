//! Recording session controller.
//!
//! One `SessionController` owns one recording: it requests exclusive
//! microphone access, streams ordered audio chunks to a subscribed
//! consumer, and persists the final meeting status when stopped.
//! Sessions are single-use; every start/stop cycle gets a fresh
//! controller.
//!
//! Resource rule: the capture stream lives in a take-once slot, so the
//! stop path, the fault watcher and the cancellation path cannot double
//! release the device, and no exit path leaves it held. The status sync
//! runs strictly after the device has been released and never blocks
//! chunk delivery.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::{MeetingStatus, StatusSync};

use super::capture::{AudioChunk, CaptureStream, ChunkSink, InputDevice};
use super::error::{SessionError, SyncError};
use super::status::{SessionStatusHandle, StopDecision};

const CHUNK_CHANNEL_CAPACITY: usize = 32;

/// Retry policy for persisting the final meeting status.
#[derive(Debug, Clone, Copy)]
pub struct SyncPolicy {
    /// Attempts before giving up and failing the session.
    pub attempts: u32,
    /// Base delay between attempts, multiplied by the attempt number.
    pub backoff: Duration,
    /// Per-attempt timeout.
    pub attempt_timeout: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

/// Per-session knobs.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Seconds of captured audio per emitted chunk.
    pub chunk_interval: Duration,
    pub sync: SyncPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            chunk_interval: Duration::from_secs(5),
            sync: SyncPolicy::default(),
        }
    }
}

/// Result of stopping a live recording. Device-release and status-sync
/// failures are independent outcomes and are reported separately.
#[derive(Debug)]
pub struct StopReport {
    pub meeting_id: i64,
    pub chunks_delivered: u64,
    pub ended_at: DateTime<Utc>,
    pub release_error: Option<super::capture::DeviceError>,
    pub sync_error: Option<SyncError>,
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.release_error.is_none() && self.sync_error.is_none()
    }
}

/// Outcome of a `stop()` call.
#[derive(Debug)]
pub enum StopOutcome {
    /// Capture was live and has been torn down; see the report.
    Stopped(StopReport),
    /// Stop arrived while the device grant was still pending; the
    /// request has been abandoned and the session ends `Cancelled`.
    CancelRequested,
}

pub struct SessionController {
    session_id: Uuid,
    meeting_id: i64,
    device: Box<dyn InputDevice>,
    store: Arc<dyn StatusSync>,
    options: SessionOptions,
    status: SessionStatusHandle,
    cancel: CancellationToken,
    stream: Arc<Mutex<Option<Box<dyn CaptureStream>>>>,
    sink: Arc<Mutex<Option<ChunkSink>>>,
}

impl SessionController {
    pub fn new(
        meeting_id: i64,
        device: Box<dyn InputDevice>,
        store: Arc<dyn StatusSync>,
        options: SessionOptions,
        status: SessionStatusHandle,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            meeting_id,
            device,
            store,
            options,
            status,
            cancel: CancellationToken::new(),
            stream: Arc::new(Mutex::new(None)),
            sink: Arc::new(Mutex::new(None)),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn meeting_id(&self) -> i64 {
        self.meeting_id
    }

    pub fn status(&self) -> SessionStatusHandle {
        self.status.clone()
    }

    /// Begin recording. Only valid on a fresh session; returns the
    /// receiver on which chunks arrive in capture order.
    pub async fn start(&self) -> Result<mpsc::Receiver<AudioChunk>, SessionError> {
        self.status
            .begin(self.meeting_id, self.session_id)
            .await
            .map_err(|phase| SessionError::AlreadyStarted(phase.as_str()))?;

        info!(
            session = %self.session_id,
            meeting = self.meeting_id,
            "requesting audio input access"
        );

        let stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.status.cancelled().await;
                info!(session = %self.session_id, "access request abandoned");
                return Err(SessionError::Cancelled);
            }
            granted = self.device.request_access() => match granted {
                Ok(stream) => stream,
                Err(err) => {
                    self.status.failed(err.to_string()).await;
                    warn!(session = %self.session_id, error = %err, "audio input access denied");
                    return Err(SessionError::Device(err));
                }
            },
        };

        if !self.status.try_begin_recording(&self.cancel).await {
            // A stop raced the grant: surrender the device before
            // reporting the cancellation.
            if let Err(err) = stream.release().await {
                warn!(
                    session = %self.session_id,
                    error = %err,
                    "failed to release input after cancelled grant"
                );
            }
            self.status.cancelled().await;
            return Err(SessionError::Cancelled);
        }

        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let (fault_tx, fault_rx) = mpsc::channel(1);
        let sink = ChunkSink::new(chunk_tx, fault_tx);

        let mut stream = stream;
        if let Err(err) = stream.start(self.options.chunk_interval, sink.clone()).await {
            if let Err(release_err) = stream.release().await {
                warn!(
                    session = %self.session_id,
                    error = %release_err,
                    "failed to release input after capture start failure"
                );
            }
            self.status.failed(err.to_string()).await;
            return Err(SessionError::Device(err));
        }

        *self.stream.lock().await = Some(stream);
        *self.sink.lock().await = Some(sink);
        self.spawn_fault_watcher(fault_rx);

        info!(
            session = %self.session_id,
            meeting = self.meeting_id,
            interval = ?self.options.chunk_interval,
            "recording started"
        );
        Ok(chunk_rx)
    }

    /// Stop the session. From `Recording` this flushes the partial
    /// chunk, releases the device exactly once, and then syncs the
    /// meeting status. From `Requesting` it abandons the pending access
    /// request.
    pub async fn stop(&self) -> Result<StopOutcome, SessionError> {
        match self.status.decide_stop(&self.cancel).await {
            StopDecision::Cancel => {
                info!(
                    session = %self.session_id,
                    "stop requested while access pending, abandoning request"
                );
                Ok(StopOutcome::CancelRequested)
            }
            StopDecision::Reject(phase) => Err(SessionError::InvalidState(phase.as_str())),
            StopDecision::Stop => Ok(StopOutcome::Stopped(self.finish().await)),
        }
    }

    async fn finish(&self) -> StopReport {
        let ended_at = Utc::now();

        // decide_stop is exclusive, so the slot still holds the stream
        // unless the fault watcher beat us to a failure.
        let stream = self.stream.lock().await.take();

        let release_error = match stream {
            Some(mut stream) => {
                // Flush the partial buffer before surrendering the
                // device; a flush failure loses the tail but must not
                // prevent release.
                if let Err(err) = stream.stop().await {
                    warn!(
                        session = %self.session_id,
                        error = %err,
                        "failed to flush capture buffer"
                    );
                }

                match stream.release().await {
                    Ok(()) => None,
                    Err(err) => {
                        warn!(
                            session = %self.session_id,
                            error = %err,
                            "failed to release audio input"
                        );
                        Some(err)
                    }
                }
            }
            None => None,
        };

        let chunks_delivered = match self.sink.lock().await.take() {
            Some(sink) => sink.delivered(),
            None => 0,
        };
        self.status.set_chunks_delivered(chunks_delivered).await;

        // Sync strictly after release; the chunk consumer drains
        // independently of this call.
        let sync_error = match self.sync_completed(ended_at).await {
            Ok(()) => {
                self.status.completed().await;
                None
            }
            Err(err) => {
                error!(
                    session = %self.session_id,
                    meeting = self.meeting_id,
                    error = %err,
                    "meeting status sync failed"
                );
                self.status.failed(err.to_string()).await;
                Some(err)
            }
        };

        info!(
            session = %self.session_id,
            meeting = self.meeting_id,
            chunks = chunks_delivered,
            "recording stopped"
        );

        StopReport {
            meeting_id: self.meeting_id,
            chunks_delivered,
            ended_at,
            release_error,
            sync_error,
        }
    }

    async fn sync_completed(&self, ended_at: DateTime<Utc>) -> Result<(), SyncError> {
        let policy = self.options.sync;
        let mut last: Option<SyncError> = None;

        for attempt in 1..=policy.attempts {
            let update =
                self.store
                    .update_meeting_status(self.meeting_id, MeetingStatus::Completed, ended_at);

            match timeout(policy.attempt_timeout, update).await {
                Ok(Ok(())) => {
                    if attempt > 1 {
                        info!(
                            session = %self.session_id,
                            attempt,
                            "meeting status sync confirmed after retry"
                        );
                    }
                    return Ok(());
                }
                Ok(Err(err)) => {
                    warn!(
                        session = %self.session_id,
                        attempt,
                        error = %err,
                        "meeting status update failed"
                    );
                    last = Some(SyncError::UpdateFailed(err.to_string()));
                }
                Err(_) => {
                    warn!(
                        session = %self.session_id,
                        attempt,
                        "meeting status update timed out"
                    );
                    last = Some(SyncError::TimedOut(policy.attempt_timeout));
                }
            }

            if attempt < policy.attempts {
                sleep(policy.backoff * attempt).await;
            }
        }

        let last = last.unwrap_or(SyncError::UpdateFailed("no attempt made".to_string()));
        if policy.attempts == 1 {
            Err(last)
        } else {
            Err(SyncError::Exhausted {
                attempts: policy.attempts,
                last: last.to_string(),
            })
        }
    }

    /// Watches for capture faults (device unplugged, stream died) while
    /// recording, and fails the session rather than letting it hang.
    /// Exits quietly once the stream is torn down through the normal
    /// stop path.
    fn spawn_fault_watcher(&self, mut faults: mpsc::Receiver<super::capture::DeviceError>) {
        let status = self.status.clone();
        let stream_slot = Arc::clone(&self.stream);
        let sink_slot = Arc::clone(&self.sink);
        let session_id = self.session_id;

        tokio::spawn(async move {
            if let Some(err) = faults.recv().await {
                if !status.fail_if_recording(err.to_string()).await {
                    // stop() already owns the teardown
                    return;
                }
                error!(session = %session_id, error = %err, "capture fault, session failed");
                if let Some(stream) = stream_slot.lock().await.take() {
                    if let Err(release_err) = stream.release().await {
                        warn!(
                            session = %session_id,
                            error = %release_err,
                            "failed to release input after capture fault"
                        );
                    }
                }
                if let Some(sink) = sink_slot.lock().await.take() {
                    status.set_chunks_delivered(sink.delivered()).await;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::capture::DeviceError;
    use crate::recorder::status::SessionPhase;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};
    use std::sync::Mutex as StdMutex;

    const MEETING_ID: i64 = 42;
    const TICK: &[u8] = &[0xAB];
    const FLUSH: &[u8] = &[0xFF];

    #[derive(Default)]
    struct MockCapture {
        sink: StdMutex<Option<ChunkSink>>,
        access_requests: AtomicU32,
        releases: AtomicU32,
        fail_release: AtomicBool,
    }

    impl MockCapture {
        async fn tick(&self) {
            let sink = self
                .sink
                .lock()
                .unwrap()
                .clone()
                .expect("capture not started");
            assert!(sink.push(TICK.to_vec()).await);
        }

        fn fault(&self, err: DeviceError) {
            let sink = self
                .sink
                .lock()
                .unwrap()
                .clone()
                .expect("capture not started");
            sink.fail(err);
        }

        fn releases(&self) -> u32 {
            self.releases.load(AtomicOrdering::SeqCst)
        }

        fn access_requests(&self) -> u32 {
            self.access_requests.load(AtomicOrdering::SeqCst)
        }
    }

    struct MockStream {
        shared: Arc<MockCapture>,
    }

    #[async_trait]
    impl CaptureStream for MockStream {
        async fn start(&mut self, _interval: Duration, sink: ChunkSink) -> Result<(), DeviceError> {
            *self.shared.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), DeviceError> {
            let sink = self.shared.sink.lock().unwrap().take();
            if let Some(sink) = sink {
                let _ = sink.push(FLUSH.to_vec()).await;
            }
            Ok(())
        }

        async fn release(self: Box<Self>) -> Result<(), DeviceError> {
            self.shared.sink.lock().unwrap().take();
            self.shared.releases.fetch_add(1, AtomicOrdering::SeqCst);
            if self.shared.fail_release.load(AtomicOrdering::SeqCst) {
                return Err(DeviceError::ReleaseFailed("device busy".to_string()));
            }
            Ok(())
        }
    }

    enum Access {
        Grant,
        Deny,
        Pending,
    }

    struct MockDevice {
        shared: Arc<MockCapture>,
        access: Access,
    }

    #[async_trait]
    impl InputDevice for MockDevice {
        async fn request_access(&self) -> Result<Box<dyn CaptureStream>, DeviceError> {
            self.shared
                .access_requests
                .fetch_add(1, AtomicOrdering::SeqCst);
            match self.access {
                Access::Grant => Ok(Box::new(MockStream {
                    shared: Arc::clone(&self.shared),
                })),
                Access::Deny => Err(DeviceError::AccessDenied("permission denied".to_string())),
                Access::Pending => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    #[derive(Default)]
    struct MockStore {
        failures_left: AtomicU32,
        calls: StdMutex<Vec<(i64, MeetingStatus)>>,
    }

    impl MockStore {
        fn calls(&self) -> Vec<(i64, MeetingStatus)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatusSync for MockStore {
        async fn update_meeting_status(
            &self,
            id: i64,
            status: MeetingStatus,
            _ended_at: DateTime<Utc>,
        ) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push((id, status));
            if self.failures_left.load(AtomicOrdering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, AtomicOrdering::SeqCst);
                return Err(anyhow!("backend unavailable"));
            }
            Ok(())
        }
    }

    struct Harness {
        capture: Arc<MockCapture>,
        store: Arc<MockStore>,
        session: Arc<SessionController>,
    }

    fn harness(access: Access, update_failures: u32, fail_release: bool) -> Harness {
        let capture = Arc::new(MockCapture::default());
        capture
            .fail_release
            .store(fail_release, AtomicOrdering::SeqCst);

        let store = Arc::new(MockStore::default());
        store
            .failures_left
            .store(update_failures, AtomicOrdering::SeqCst);

        let device = MockDevice {
            shared: Arc::clone(&capture),
            access,
        };

        let options = SessionOptions {
            chunk_interval: Duration::from_secs(5),
            sync: SyncPolicy {
                attempts: 3,
                backoff: Duration::from_millis(1),
                attempt_timeout: Duration::from_millis(200),
            },
        };

        let session = Arc::new(SessionController::new(
            MEETING_ID,
            Box::new(device),
            store.clone() as Arc<dyn StatusSync>,
            options,
            SessionStatusHandle::default(),
        ));

        Harness {
            capture,
            store,
            session,
        }
    }

    fn stopped(outcome: StopOutcome) -> StopReport {
        match outcome {
            StopOutcome::Stopped(report) => report,
            other => panic!("expected Stopped, got {:?}", other),
        }
    }

    async fn drain(mut rx: mpsc::Receiver<AudioChunk>) -> Vec<AudioChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        chunks
    }

    async fn wait_for_phase(status: &SessionStatusHandle, phase: SessionPhase) {
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if status.get().await.phase == phase {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("phase {:?} not reached in time", phase));
    }

    #[tokio::test]
    async fn test_two_ticks_then_stop_delivers_three_chunks_and_one_sync() {
        let h = harness(Access::Grant, 0, false);

        let rx = h.session.start().await.unwrap();
        h.capture.tick().await;
        h.capture.tick().await;

        let report = stopped(h.session.stop().await.unwrap());
        assert!(report.is_clean());
        assert_eq!(report.chunks_delivered, 3);

        let chunks = drain(rx).await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].data, FLUSH.to_vec());

        assert_eq!(h.store.calls(), vec![(MEETING_ID, MeetingStatus::Completed)]);
        assert_eq!(h.capture.releases(), 1);
        assert_eq!(
            h.session.status().get().await.phase,
            SessionPhase::Completed
        );
    }

    #[tokio::test]
    async fn test_chunk_order_preserved_with_final_flush() {
        let h = harness(Access::Grant, 0, false);

        let rx = h.session.start().await.unwrap();
        for _ in 0..5 {
            h.capture.tick().await;
        }
        stopped(h.session.stop().await.unwrap());

        let chunks = drain(rx).await;
        let seqs: Vec<u64> = chunks.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4, 5]);
        assert!(chunks[..5].iter().all(|c| c.data == TICK.to_vec()));
        assert_eq!(chunks[5].data, FLUSH.to_vec());
    }

    #[tokio::test]
    async fn test_access_denied_fails_session_without_sync() {
        let h = harness(Access::Deny, 0, false);

        let err = h.session.start().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Device(DeviceError::AccessDenied(_))
        ));

        let state = h.session.status().get().await;
        assert_eq!(state.phase, SessionPhase::Failed);
        assert!(state.last_error.is_some());

        assert!(h.store.calls().is_empty());
        assert_eq!(h.capture.releases(), 0);
    }

    #[tokio::test]
    async fn test_start_twice_rejected_without_disturbing_capture() {
        let h = harness(Access::Grant, 0, false);

        let rx = h.session.start().await.unwrap();
        let err = h.session.start().await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyStarted("recording")));

        h.capture.tick().await;
        let report = stopped(h.session.stop().await.unwrap());
        assert_eq!(report.chunks_delivered, 2);

        let seqs: Vec<u64> = drain(rx).await.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(h.capture.access_requests(), 1);
    }

    #[tokio::test]
    async fn test_stop_before_grant_abandons_request() {
        let h = harness(Access::Pending, 0, false);
        let status = h.session.status();

        let starter = {
            let session = Arc::clone(&h.session);
            tokio::spawn(async move { session.start().await })
        };

        wait_for_phase(&status, SessionPhase::Requesting).await;

        let outcome = h.session.stop().await.unwrap();
        assert!(matches!(outcome, StopOutcome::CancelRequested));

        let start_result = starter.await.unwrap();
        assert!(matches!(start_result, Err(SessionError::Cancelled)));

        let state = status.get().await;
        assert_eq!(state.phase, SessionPhase::Cancelled);
        assert_eq!(state.chunks_delivered, 0);

        // the device was never acquired, so there is nothing to release
        assert_eq!(h.capture.access_requests(), 1);
        assert_eq!(h.capture.releases(), 0);
        assert!(h.store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sync_failure_reported_after_device_released() {
        let h = harness(Access::Grant, u32::MAX, false);

        let rx = h.session.start().await.unwrap();
        h.capture.tick().await;

        let report = stopped(h.session.stop().await.unwrap());
        assert!(report.release_error.is_none());
        assert!(matches!(
            report.sync_error,
            Some(SyncError::Exhausted { attempts: 3, .. })
        ));

        // released exactly once, retries never re-acquired the device
        assert_eq!(h.capture.releases(), 1);
        assert_eq!(h.capture.access_requests(), 1);
        assert_eq!(h.store.calls().len(), 3);

        // chunks were still delivered despite the failed sync
        assert_eq!(drain(rx).await.len(), 2);
        assert_eq!(h.session.status().get().await.phase, SessionPhase::Failed);
    }

    #[tokio::test]
    async fn test_sync_retry_recovers() {
        let h = harness(Access::Grant, 1, false);

        h.session.start().await.unwrap();
        let report = stopped(h.session.stop().await.unwrap());

        assert!(report.sync_error.is_none());
        assert_eq!(h.store.calls().len(), 2);
        assert_eq!(h.capture.releases(), 1);
        assert_eq!(
            h.session.status().get().await.phase,
            SessionPhase::Completed
        );
    }

    #[tokio::test]
    async fn test_release_failure_does_not_block_sync() {
        let h = harness(Access::Grant, 0, true);

        let rx = h.session.start().await.unwrap();
        h.capture.tick().await;

        let report = stopped(h.session.stop().await.unwrap());
        assert!(matches!(
            report.release_error,
            Some(DeviceError::ReleaseFailed(_))
        ));
        assert!(report.sync_error.is_none());

        assert_eq!(h.store.calls(), vec![(MEETING_ID, MeetingStatus::Completed)]);
        assert_eq!(drain(rx).await.len(), 2);
        assert_eq!(
            h.session.status().get().await.phase,
            SessionPhase::Completed
        );
    }

    #[tokio::test]
    async fn test_device_fault_mid_recording_fails_session() {
        let h = harness(Access::Grant, 0, false);
        let status = h.session.status();

        let rx = h.session.start().await.unwrap();
        h.capture.tick().await;
        h.capture
            .fault(DeviceError::DeviceLost("unplugged".to_string()));

        wait_for_phase(&status, SessionPhase::Failed).await;

        // the watcher releases the stream just after failing the phase
        tokio::time::timeout(Duration::from_secs(1), async {
            while h.capture.releases() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("device not released after capture fault");
        assert_eq!(h.capture.releases(), 1);
        assert!(h.store.calls().is_empty());

        // the session is terminal; stop has nothing left to do
        let err = h.session.stop().await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidState("failed")));

        // the chunk produced before the fault is still readable
        assert_eq!(drain(rx).await.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_on_fresh_session_rejected() {
        let h = harness(Access::Grant, 0, false);
        let err = h.session.stop().await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidState("idle")));
    }
}
