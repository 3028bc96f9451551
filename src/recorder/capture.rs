//! Capture seam between the recording session and the audio platform.
//!
//! [`InputDevice`] hands out exclusive [`CaptureStream`]s; a running
//! stream pushes ordered [`AudioChunk`]s through a [`ChunkSink`]. The
//! sink also carries fault reports so a device that disappears
//! mid-recording fails the session instead of leaving it hanging.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised by the audio input layer.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("audio input access denied: {0}")]
    AccessDenied(String),

    #[error("no audio input device available")]
    NoDevice,

    #[error("audio input device lost: {0}")]
    DeviceLost(String),

    #[error("audio capture failed: {0}")]
    CaptureFailed(String),

    #[error("failed to release audio input: {0}")]
    ReleaseFailed(String),
}

/// A bounded slice of captured audio. `seq` is contiguous from 0 within
/// one session; `data` is opaque to everything but the device backend
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub seq: u64,
    pub data: Vec<u8>,
}

/// Ordered chunk delivery handle given to a capture stream.
///
/// Cloneable so the backend can share it with its callbacks; sequence
/// numbers are assigned at push time, so delivery order is the sequence
/// order.
#[derive(Clone)]
pub struct ChunkSink {
    chunks: mpsc::Sender<AudioChunk>,
    faults: mpsc::Sender<DeviceError>,
    next_seq: Arc<AtomicU64>,
}

impl ChunkSink {
    pub(crate) fn new(
        chunks: mpsc::Sender<AudioChunk>,
        faults: mpsc::Sender<DeviceError>,
    ) -> Self {
        Self {
            chunks,
            faults,
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Deliver the next chunk. Returns false once the consumer is gone.
    pub async fn push(&self, data: Vec<u8>) -> bool {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.chunks.send(AudioChunk { seq, data }).await.is_ok()
    }

    /// Deliver the next chunk from outside the async runtime (capture
    /// threads). Returns false once the consumer is gone.
    pub fn push_blocking(&self, data: Vec<u8>) -> bool {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.chunks.blocking_send(AudioChunk { seq, data }).is_ok()
    }

    /// Report an unrecoverable capture fault (device unplugged, stream
    /// died). The first report wins; later ones are dropped.
    pub fn fail(&self, err: DeviceError) {
        let _ = self.faults.try_send(err);
    }

    /// Number of chunks pushed so far.
    pub fn delivered(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }
}

/// A live, exclusively-held capture stream.
#[async_trait]
pub trait CaptureStream: Send {
    /// Begin capturing, pushing one chunk per `interval` of captured
    /// audio into `sink`. Resolves once capture is actually running.
    async fn start(&mut self, interval: Duration, sink: ChunkSink) -> Result<(), DeviceError>;

    /// Stop capturing and flush any partially-filled buffer as a final
    /// chunk, without waiting for the next interval boundary.
    async fn stop(&mut self) -> Result<(), DeviceError>;

    /// Release the underlying device handle. Consumes the stream; a
    /// released stream cannot be restarted.
    async fn release(self: Box<Self>) -> Result<(), DeviceError>;
}

/// An audio input that can be asked for exclusive access.
#[async_trait]
pub trait InputDevice: Send + Sync {
    async fn request_access(&self) -> Result<Box<dyn CaptureStream>, DeviceError>;
}
