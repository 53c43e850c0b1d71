use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::{AudioFrame, CaptureConfig};

/// A source of audio frames (microphone, file, or a test harness).
///
/// `start` hands back a channel of frames; the channel closing means the
/// source has ended or failed, and whatever was received so far is valid.
#[async_trait::async_trait]
pub trait CaptureSource: Send {
    /// Begin producing frames. Device-open failures surface here.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop producing frames and release the underlying device or file.
    async fn stop(&mut self) -> Result<()>;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Capture source factory
pub struct CaptureSourceFactory;

impl CaptureSourceFactory {
    /// Create a capture source from the configured input selector:
    /// `"microphone"` for the default input device, anything else is
    /// treated as a path to a WAV file (batch/testing input).
    pub fn create(input: &str, config: CaptureConfig) -> Result<Box<dyn CaptureSource>> {
        match input {
            "microphone" => {
                #[cfg(feature = "audio")]
                {
                    Ok(Box::new(MicrophoneSource::new(config)))
                }

                #[cfg(not(feature = "audio"))]
                {
                    let _ = config;
                    anyhow::bail!(
                        "microphone capture requires the \"audio\" feature at build time"
                    )
                }
            }
            path => Ok(Box::new(WavFileSource::new(path, config))),
        }
    }
}

/// Replays a WAV file as a stream of capture frames.
///
/// Frames carry audio-time timestamps, so downstream silence and duration
/// handling behaves exactly as it would for a live device.
pub struct WavFileSource {
    path: PathBuf,
    config: CaptureConfig,
    task: Option<JoinHandle<()>>,
}

impl WavFileSource {
    pub fn new(path: impl Into<PathBuf>, config: CaptureConfig) -> Self {
        Self {
            path: path.into(),
            config,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureSource for WavFileSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let reader = hound::WavReader::open(&self.path)
            .with_context(|| format!("Failed to open WAV file: {}", self.path.display()))?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "unsupported WAV input {}: expected 16-bit PCM",
                self.path.display()
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read WAV samples")?;

        info!(
            "WAV capture source opened: {} ({} samples, {}Hz, {}ch)",
            self.path.display(),
            samples.len(),
            spec.sample_rate,
            spec.channels
        );

        let frame_len = self.config.samples_per_frame().max(1);
        let (tx, rx) = mpsc::channel(64);

        let task = tokio::spawn(async move {
            let mut sent: u64 = 0;
            let per_second = u64::from(spec.sample_rate) * u64::from(spec.channels);

            for chunk in samples.chunks(frame_len) {
                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate: spec.sample_rate,
                    channels: spec.channels,
                    timestamp_ms: sent * 1000 / per_second.max(1),
                };
                sent += chunk.len() as u64;

                if tx.send(frame).await.is_err() {
                    break;
                }
            }
            // tx drops here, closing the channel to signal end-of-input
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

#[cfg(feature = "audio")]
pub use mic::MicrophoneSource;

#[cfg(feature = "audio")]
mod mic {
    use super::*;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::SampleRate;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tracing::{debug, warn};

    /// Captures audio from the default input device via cpal.
    ///
    /// The cpal stream is confined to a dedicated OS thread (streams are not
    /// `Send`); frames cross into async land over an mpsc channel.
    pub struct MicrophoneSource {
        config: CaptureConfig,
        stop: Arc<AtomicBool>,
        thread: Option<std::thread::JoinHandle<()>>,
    }

    impl MicrophoneSource {
        pub fn new(config: CaptureConfig) -> Self {
            Self {
                config,
                stop: Arc::new(AtomicBool::new(false)),
                thread: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl CaptureSource for MicrophoneSource {
        async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
            self.stop.store(false, Ordering::SeqCst);

            let (tx, rx) = mpsc::channel(64);
            let (ready_tx, ready_rx) = oneshot::channel();
            let stop = Arc::clone(&self.stop);
            let config = self.config.clone();

            let thread = std::thread::spawn(move || {
                run_capture_thread(config, stop, tx, ready_tx);
            });
            self.thread = Some(thread);

            match ready_rx.await {
                Ok(Ok(())) => Ok(rx),
                Ok(Err(e)) => {
                    self.thread.take();
                    Err(e).context("Failed to open input device")
                }
                Err(_) => anyhow::bail!("capture thread exited before opening the device"),
            }
        }

        async fn stop(&mut self) -> Result<()> {
            self.stop.store(true, Ordering::SeqCst);
            if let Some(thread) = self.thread.take() {
                let _ = tokio::task::spawn_blocking(move || thread.join()).await;
            }
            debug!("microphone source stopped");
            Ok(())
        }

        fn name(&self) -> &str {
            "microphone"
        }
    }

    fn run_capture_thread(
        config: CaptureConfig,
        stop: Arc<AtomicBool>,
        tx: mpsc::Sender<AudioFrame>,
        ready: oneshot::Sender<Result<()>>,
    ) {
        let stream = match open_input_stream(&config, Arc::clone(&stop), tx) {
            Ok(stream) => {
                let _ = ready.send(Ok(()));
                stream
            }
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        while !stop.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(50));
        }

        // Dropping the stream releases the device and the frame sender.
        drop(stream);
    }

    fn open_input_stream(
        config: &CaptureConfig,
        stop: Arc<AtomicBool>,
        tx: mpsc::Sender<AudioFrame>,
    ) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("no input device available")?;

        let supported = device
            .supported_input_configs()
            .context("Failed to query input configs")?
            .find(|c| {
                c.channels() == config.channels
                    && c.min_sample_rate() <= SampleRate(config.sample_rate)
                    && c.max_sample_rate() >= SampleRate(config.sample_rate)
            })
            .with_context(|| {
                format!(
                    "no input config for {}Hz / {} channels",
                    config.sample_rate, config.channels
                )
            })?;

        let stream_config = supported
            .with_sample_rate(SampleRate(config.sample_rate))
            .config();

        info!(
            "opening input device {} at {}Hz, {} channels",
            device.name().unwrap_or_default(),
            config.sample_rate,
            config.channels
        );

        let frame_len = config.samples_per_frame().max(1);
        let sample_rate = config.sample_rate;
        let channels = config.channels;
        let per_second = u64::from(sample_rate) * u64::from(channels);
        let err_stop = Arc::clone(&stop);

        let mut pending: Vec<i16> = Vec::with_capacity(frame_len * 2);
        let mut sent: u64 = 0;

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        let s = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                        pending.push(s);
                    }

                    while pending.len() >= frame_len {
                        let rest = pending.split_off(frame_len);
                        let samples = std::mem::replace(&mut pending, rest);
                        let frame = AudioFrame {
                            samples,
                            sample_rate,
                            channels,
                            timestamp_ms: sent * 1000 / per_second.max(1),
                        };
                        sent += frame.samples.len() as u64;

                        // The audio callback must never block; a full channel
                        // means the consumer stalled, so the frame is dropped.
                        if let Err(e) = tx.try_send(frame) {
                            warn!("dropping capture frame: {}", e);
                        }
                    }
                },
                move |err| {
                    tracing::error!("input stream error: {}", err);
                    err_stop.store(true, Ordering::SeqCst);
                },
                None,
            )
            .context("Failed to build input stream")?;

        stream.play().context("Failed to start input stream")?;

        Ok(stream)
    }
}
