//! Microphone capture via cpal.
//!
//! The cpal stream handle is not `Send`, so it never leaves the capture
//! thread: the thread owns the stream, accumulates samples from the
//! input callback, and cuts a chunk every interval. The async side
//! talks to it over channels only.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task;
use tracing::{debug, info, warn};

use super::capture::{CaptureStream, ChunkSink, DeviceError, InputDevice};

const READY_TIMEOUT: Duration = Duration::from_secs(5);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// The default microphone as an [`InputDevice`].
pub struct MicInputDevice {
    sample_rate: u32,
}

impl MicInputDevice {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

#[async_trait]
impl InputDevice for MicInputDevice {
    async fn request_access(&self) -> Result<Box<dyn CaptureStream>, DeviceError> {
        let sample_rate = self.sample_rate;
        let stream = task::spawn_blocking(move || MicCaptureStream::open(sample_rate))
            .await
            .map_err(|e| DeviceError::CaptureFailed(e.to_string()))??;
        Ok(Box::new(stream))
    }
}

enum WorkerCommand {
    /// Flush the partial buffer as a final chunk and exit.
    Flush(oneshot::Sender<()>),
}

struct CaptureWorker {
    commands: std::sync::mpsc::Sender<WorkerCommand>,
    handle: thread::JoinHandle<()>,
}

/// A granted microphone stream. Capture runs on a dedicated thread once
/// started; dropping the command channel is enough to wind it down.
pub struct MicCaptureStream {
    sample_rate: u32,
    worker: Option<CaptureWorker>,
}

impl MicCaptureStream {
    fn open(sample_rate: u32) -> Result<Self, DeviceError> {
        // Probe for a usable input before reporting the grant. The
        // capture thread re-opens the default device when it starts.
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(DeviceError::NoDevice)?;
        device
            .default_input_config()
            .map_err(|e| DeviceError::AccessDenied(e.to_string()))?;

        info!(
            "Microphone granted: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        Ok(Self {
            sample_rate,
            worker: None,
        })
    }
}

#[async_trait]
impl CaptureStream for MicCaptureStream {
    async fn start(&mut self, interval: Duration, sink: ChunkSink) -> Result<(), DeviceError> {
        if self.worker.is_some() {
            return Err(DeviceError::CaptureFailed(
                "capture already started".to_string(),
            ));
        }

        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let sample_rate = self.sample_rate;

        let handle = thread::Builder::new()
            .name("synca-capture".to_string())
            .spawn(move || capture_worker(sample_rate, interval, sink, cmd_rx, ready_tx))
            .map_err(|e| DeviceError::CaptureFailed(e.to_string()))?;

        let ready = tokio::time::timeout(READY_TIMEOUT, ready_rx)
            .await
            .map_err(|_| DeviceError::CaptureFailed("capture thread not ready".to_string()))?
            .map_err(|_| DeviceError::CaptureFailed("capture thread died".to_string()))?;

        match ready {
            Ok(()) => {
                self.worker = Some(CaptureWorker {
                    commands: cmd_tx,
                    handle,
                });
                Ok(())
            }
            Err(err) => {
                let _ = handle.join();
                Err(err)
            }
        }
    }

    async fn stop(&mut self) -> Result<(), DeviceError> {
        let Some(worker) = self.worker.as_ref() else {
            return Ok(());
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        worker
            .commands
            .send(WorkerCommand::Flush(ack_tx))
            .map_err(|_| DeviceError::CaptureFailed("capture thread gone".to_string()))?;

        tokio::time::timeout(FLUSH_TIMEOUT, ack_rx)
            .await
            .map_err(|_| DeviceError::CaptureFailed("capture flush timed out".to_string()))?
            .map_err(|_| DeviceError::CaptureFailed("capture thread died mid-flush".to_string()))
    }

    async fn release(self: Box<Self>) -> Result<(), DeviceError> {
        let Some(worker) = self.worker else {
            // never started, nothing held
            return Ok(());
        };

        // Closing the command channel ends the worker loop if a flush
        // never arrived; the thread drops the cpal stream on exit.
        drop(worker.commands);
        task::spawn_blocking(move || worker.handle.join())
            .await
            .map_err(|e| DeviceError::ReleaseFailed(e.to_string()))?
            .map_err(|_| DeviceError::ReleaseFailed("capture thread panicked".to_string()))
    }
}

fn capture_worker(
    sample_rate: u32,
    interval: Duration,
    sink: ChunkSink,
    commands: std::sync::mpsc::Receiver<WorkerCommand>,
    ready: oneshot::Sender<Result<(), DeviceError>>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        let _ = ready.send(Err(DeviceError::NoDevice));
        return;
    };

    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let buffer: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
    let cb_buffer = Arc::clone(&buffer);
    let fault_sink = sink.clone();

    let stream = match device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if let Ok(mut samples) = cb_buffer.lock() {
                samples.extend_from_slice(data);
            }
        },
        move |err| fault_sink.fail(DeviceError::DeviceLost(err.to_string())),
        None,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(DeviceError::CaptureFailed(e.to_string())));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(DeviceError::CaptureFailed(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));

    loop {
        match commands.recv_timeout(interval) {
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                let samples = {
                    let mut guard = buffer.lock().unwrap();
                    std::mem::take(&mut *guard)
                };
                if samples.is_empty() {
                    continue;
                }
                debug!(samples = samples.len(), "emitting interval chunk");
                if !sink.push_blocking(samples_to_bytes(&samples)) {
                    // consumer gone, stop producing
                    break;
                }
            }
            Ok(WorkerCommand::Flush(ack)) => {
                flush_remainder(&buffer, &sink);
                let _ = ack.send(());
                break;
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                // released without an explicit flush
                flush_remainder(&buffer, &sink);
                break;
            }
        }
    }

    drop(stream);
    debug!("capture worker exited");
}

fn flush_remainder(buffer: &Arc<Mutex<Vec<f32>>>, sink: &ChunkSink) {
    let samples = {
        let mut guard = buffer.lock().unwrap();
        std::mem::take(&mut *guard)
    };
    if !samples.is_empty() && !sink.push_blocking(samples_to_bytes(&samples)) {
        warn!("consumer gone before final chunk could be flushed");
    }
}

fn samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_to_bytes_round_trip() {
        let samples = [0.0f32, 0.5, -1.0];
        let bytes = samples_to_bytes(&samples);
        assert_eq!(bytes.len(), 12);

        let decoded: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(decoded, samples);
    }
}
