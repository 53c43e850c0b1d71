use anyhow::{Context, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::{wav, AudioFrame, CaptureSource};

/// Returned by `start` when a capture session is already active.
#[derive(Debug)]
pub struct AlreadyRecording;

impl fmt::Display for AlreadyRecording {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recording is already in progress")
    }
}

impl std::error::Error for AlreadyRecording {}

/// Why a capture loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Sustained sub-threshold amplitude.
    Silence,
    /// The configured duration cap.
    MaxDuration,
    /// An external `stop` call.
    Requested,
    /// The source closed its channel (end of file, device error).
    SourceEnded,
}

/// A finished take: WAV bytes plus capture statistics.
#[derive(Debug, Clone)]
pub struct Recording {
    pub wav: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: usize,
    pub duration_secs: f64,
    pub stop_reason: StopReason,
}

/// Configuration for the capture loop
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// RMS amplitude (i16 scale) below which a chunk counts as silent.
    pub silence_threshold: f64,
    /// Continuous silence that ends the recording.
    pub silence_duration: Duration,
    /// Hard cap on recording length regardless of amplitude.
    pub max_duration: Duration,
    /// How long to wait for a frame before re-checking the stop flag.
    pub poll_interval: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 500.0,
            silence_duration: Duration::from_secs(2),
            max_duration: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Records from a capture source until silence, the duration cap, or an
/// explicit stop. At most one session is active per recorder.
pub struct SilenceAwareRecorder {
    config: RecorderConfig,

    /// Doubles as the at-most-one-session guard and the manual stop signal.
    active: Arc<AtomicBool>,

    /// Handle for the capture task of the current (or last unharvested) session.
    task: Mutex<Option<JoinHandle<CaptureOutcome>>>,
}

struct CaptureOutcome {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
    reason: StopReason,
}

impl SilenceAwareRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            active: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Whether a capture loop is currently running.
    pub fn is_recording(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a capture session on the given source. Non-blocking; the capture
    /// loop runs on its own task until a stop condition fires.
    ///
    /// Fails with [`AlreadyRecording`] when a session is active, and with the
    /// source's error when the device cannot be opened.
    pub async fn start(&self, mut source: Box<dyn CaptureSource>) -> Result<()> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(AlreadyRecording.into());
        }

        let rx = match source.start().await {
            Ok(rx) => rx,
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let session_id = Uuid::new_v4();
        info!("recording session {} started ({})", session_id, source.name());

        let config = self.config.clone();
        let active = Arc::clone(&self.active);
        let handle = tokio::spawn(capture_loop(config, active, source, rx, session_id));

        let mut slot = self.task.lock().await;
        if let Some(old) = slot.replace(handle) {
            debug!("discarding unharvested take from a previous session");
            old.abort();
        }

        Ok(())
    }

    /// Signal the capture loop to end, wait for it to exit, and serialize the
    /// take as WAV. Returns `None` when nothing is recording or zero frames
    /// were captured; calling while idle is not an error.
    pub async fn stop(&self) -> Result<Option<Recording>> {
        let handle = { self.task.lock().await.take() };
        let Some(handle) = handle else {
            return Ok(None);
        };

        self.active.store(false, Ordering::SeqCst);
        let outcome = handle.await.context("capture task panicked")?;

        if outcome.samples.is_empty() {
            info!("recording ended with no captured audio");
            return Ok(None);
        }

        let wav = wav::encode(&outcome.samples, outcome.sample_rate, outcome.channels)?;
        let duration_secs = outcome.samples.len() as f64
            / (f64::from(outcome.sample_rate) * f64::from(outcome.channels));

        Ok(Some(Recording {
            wav,
            sample_rate: outcome.sample_rate,
            channels: outcome.channels,
            samples: outcome.samples.len(),
            duration_secs,
            stop_reason: outcome.reason,
        }))
    }
}

/// One capture session: append every received chunk, track silence against
/// the threshold, and exit on the first stop condition. The source is always
/// stopped before the task finishes, whatever the exit path.
async fn capture_loop(
    config: RecorderConfig,
    active: Arc<AtomicBool>,
    mut source: Box<dyn CaptureSource>,
    mut rx: mpsc::Receiver<AudioFrame>,
    session_id: Uuid,
) -> CaptureOutcome {
    let mut samples: Vec<i16> = Vec::new();
    let mut sample_rate = 0u32;
    let mut channels = 0u16;
    let mut silence_since: Option<u64> = None;

    let silence_ms = config.silence_duration.as_millis() as u64;
    let max_ms = config.max_duration.as_millis() as u64;

    let reason = loop {
        if !active.load(Ordering::SeqCst) {
            break StopReason::Requested;
        }

        let frame = match timeout(config.poll_interval, rx.recv()).await {
            Err(_) => continue, // no frame yet; re-check the stop flag
            Ok(None) => break StopReason::SourceEnded,
            Ok(Some(frame)) => frame,
        };

        sample_rate = frame.sample_rate;
        channels = frame.channels;
        let end_ms = frame.end_ms();
        let rms = rms_amplitude(&frame.samples);
        samples.extend_from_slice(&frame.samples);

        if rms < config.silence_threshold {
            let started = *silence_since.get_or_insert(end_ms);
            if end_ms.saturating_sub(started) > silence_ms {
                debug!("silence window elapsed, stopping recording");
                break StopReason::Silence;
            }
        } else {
            silence_since = None;
        }

        if end_ms > max_ms {
            debug!("maximum recording duration reached");
            break StopReason::MaxDuration;
        }
    };

    if let Err(e) = source.stop().await {
        warn!("failed to stop capture source: {}", e);
    }
    active.store(false, Ordering::SeqCst);

    info!(
        "recording session {} ended ({:?}, {} samples)",
        session_id,
        reason,
        samples.len()
    );

    CaptureOutcome {
        samples,
        sample_rate,
        channels,
        reason,
    }
}

/// Root-mean-square amplitude of a chunk, on the i16 sample scale.
pub fn rms_amplitude(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let v = f64::from(s);
            v * v
        })
        .sum();
    (sum_sq / samples.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_empty_chunk_is_zero() {
        assert_eq!(rms_amplitude(&[]), 0.0);
    }

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        let chunk = vec![1000i16; 512];
        assert!((rms_amplitude(&chunk) - 1000.0).abs() < 1e-9);

        let negative = vec![-1000i16; 512];
        assert!((rms_amplitude(&negative) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn rms_distinguishes_silence_from_speech() {
        let quiet = vec![10i16; 1024];
        let loud: Vec<i16> = (0..1024).map(|i| if i % 2 == 0 { 8000 } else { -8000 }).collect();

        assert!(rms_amplitude(&quiet) < 500.0);
        assert!(rms_amplitude(&loud) > 500.0);
    }
}
