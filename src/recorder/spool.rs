//! Chunk consumer that spools a session's audio to disk.
//!
//! Stands in for the upload/transcription collaborator: drains the
//! session's chunk stream into a WAV file so a completed recording has a
//! durable artifact. Chunks carry f32 little-endian PCM produced by the
//! microphone backend.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::capture::AudioChunk;

/// Drain `chunks` into a mono WAV file at `path`. Returns the number of
/// chunks written once the producing session ends.
pub async fn spool_to_wav(
    mut chunks: mpsc::Receiver<AudioChunk>,
    path: &Path,
    sample_rate: u32,
) -> Result<u64> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create recordings directory")?;
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create recording file {:?}", path))?;

    let mut written = 0u64;
    while let Some(chunk) = chunks.recv().await {
        for sample in chunk
            .data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        {
            writer.write_sample(sample).context("Failed to write sample")?;
        }
        written += 1;
        debug!(seq = chunk.seq, bytes = chunk.data.len(), "spooled chunk");
    }

    writer.finalize().context("Failed to finalize recording file")?;
    info!(path = ?path, chunks = written, "recording spooled");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[tokio::test]
    async fn test_spool_writes_chunks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meeting-1.wav");

        let (tx, rx) = mpsc::channel(4);
        tx.send(AudioChunk {
            seq: 0,
            data: encode(&[0.1, 0.2]),
        })
        .await
        .unwrap();
        tx.send(AudioChunk {
            seq: 1,
            data: encode(&[0.3]),
        })
        .await
        .unwrap();
        drop(tx);

        let written = spool_to_wav(rx, &path, 16000).await.unwrap();
        assert_eq!(written, 2);

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 3);
        assert!((samples[0] - 0.1).abs() < f32::EPSILON);
        assert!((samples[2] - 0.3).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_spool_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meeting-2.wav");

        let (tx, rx) = mpsc::channel::<AudioChunk>(1);
        drop(tx);

        let written = spool_to_wav(rx, &path, 16000).await.unwrap();
        assert_eq!(written, 0);
        assert!(path.exists());
    }
}
