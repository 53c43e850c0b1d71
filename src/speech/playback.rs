use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Play interleaved 16-bit PCM on the default output device, blocking until
/// the samples run out or `interrupt` is raised. Dropping the stream on the
/// interrupt path releases the device immediately.
pub fn play(
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
    volume: f32,
    interrupt: &AtomicBool,
) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no output device available")?;

    let rate = SampleRate(sample_rate);
    let mut pick = device
        .supported_output_configs()
        .context("Failed to query output configs")?
        .find(|c| {
            c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
        });
    if pick.is_none() {
        // Fall back to any channel layout that supports the rate; the source
        // frame is replicated across extra output channels.
        pick = device
            .supported_output_configs()
            .context("Failed to query output configs")?
            .find(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate);
    }
    let config = pick
        .with_context(|| format!("no output config supports {}Hz", sample_rate))?
        .with_sample_rate(rate)
        .config();

    let out_channels = config.channels as usize;
    let src_channels = usize::from(channels.max(1));

    let gain = volume.clamp(0.0, 1.0);
    let data: Arc<Vec<f32>> = Arc::new(
        samples
            .iter()
            .map(|&s| f32::from(s) / 32768.0 * gain)
            .collect(),
    );
    let total_frames = data.len() / src_channels;

    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let cb_data = Arc::clone(&data);
    let cb_position = Arc::clone(&position);
    let cb_finished = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            &config,
            move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in out.chunks_mut(out_channels) {
                    let idx = cb_position.load(Ordering::Relaxed);
                    if idx >= total_frames {
                        cb_finished.store(true, Ordering::Relaxed);
                        frame.fill(0.0);
                        continue;
                    }

                    let base = idx * src_channels;
                    for (c, slot) in frame.iter_mut().enumerate() {
                        *slot = cb_data[base + c.min(src_channels - 1)];
                    }
                    cb_position.store(idx + 1, Ordering::Relaxed);
                }
            },
            |err| tracing::error!("audio playback error: {}", err),
            None,
        )
        .context("Failed to build output stream")?;

    stream.play().context("Failed to start output stream")?;

    // Bound the wait by the clip length so a wedged device cannot hang the
    // speech worker forever.
    let duration_ms = total_frames as u64 * 1000 / u64::from(sample_rate.max(1));
    let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

    while !finished.load(Ordering::Relaxed) {
        if interrupt.load(Ordering::SeqCst) {
            debug!("playback halted mid-utterance");
            break;
        }
        if Instant::now() > deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(30));
    }

    drop(stream);
    Ok(())
}
