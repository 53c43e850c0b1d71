// Live-path integration test: WAV input through the silence-aware recorder
// into the transcriber, with the networked backend unreachable and `echo`
// standing in as the offline engine.

#![cfg(unix)]

use anyhow::Result;
use std::time::Duration;
use voxchat::audio::{wav, CaptureConfig, WavFileSource};
use voxchat::recorder::{RecorderConfig, SilenceAwareRecorder};
use voxchat::speech::{CommandRecognizer, Transcriber, WhisperApi};

#[tokio::test]
async fn live_transcription_from_a_wav_input() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("take.wav");

    let samples: Vec<i16> = (0..8000)
        .map(|i| if i % 2 == 0 { 4000 } else { -4000 })
        .collect();
    std::fs::write(&path, wav::encode(&samples, 16000, 1)?)?;

    let primary = Box::new(WhisperApi::new(
        "http://127.0.0.1:9/transcribe".to_string(),
        String::new(),
        "whisper-1".to_string(),
    ));
    let fallback = Box::new(CommandRecognizer::from_command("echo heard")?);
    let transcriber = Transcriber::new(primary, Some(fallback));

    let recorder = SilenceAwareRecorder::new(RecorderConfig {
        silence_threshold: 500.0,
        silence_duration: Duration::from_secs(2),
        max_duration: Duration::from_secs(10),
        poll_interval: Duration::from_millis(20),
    });

    let source = WavFileSource::new(
        &path,
        CaptureConfig {
            sample_rate: 16000,
            channels: 1,
            chunk_size: 1600,
        },
    );

    let text = transcriber
        .transcribe_live(&recorder, Box::new(source), Duration::from_secs(10))
        .await
        .expect("live transcription should produce text");

    assert!(text.starts_with("heard"));
    assert!(!recorder.is_recording());

    Ok(())
}
