use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::io::Write;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::audio::CaptureSource;
use crate::config::SttConfig;
use crate::recorder::SilenceAwareRecorder;

/// A speech-recognition engine.
///
/// `Ok(None)` means the service was reachable but could not understand the
/// audio; transport and service failures are errors, and only those trigger
/// the fallback engine.
#[async_trait::async_trait]
pub trait RecognitionBackend: Send + Sync {
    async fn transcribe(&self, wav: &[u8]) -> Result<Option<String>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Whisper-compatible HTTP recognition backend.
pub struct WhisperApi {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl WhisperApi {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait::async_trait]
impl RecognitionBackend for WhisperApi {
    async fn transcribe(&self, wav: &[u8]) -> Result<Option<String>> {
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .context("Failed to build multipart body")?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .context("transcription request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("transcription service error {}: {}", status, body);
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        let text = result.text.trim().to_string();
        Ok((!text.is_empty()).then_some(text))
    }

    fn name(&self) -> &str {
        "whisper-api"
    }
}

/// Offline recognition via an external command (e.g. a whisper.cpp binary).
///
/// The recording is written to a scratch WAV file whose path is appended as
/// the final argument; the transcript is read from stdout.
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn from_command(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().context("empty recognizer command")?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait::async_trait]
impl RecognitionBackend for CommandRecognizer {
    async fn transcribe(&self, wav: &[u8]) -> Result<Option<String>> {
        let mut file = tempfile::Builder::new()
            .prefix("voxchat-")
            .suffix(".wav")
            .tempfile()
            .context("Failed to create scratch WAV file")?;
        file.write_all(wav)
            .context("Failed to write scratch WAV file")?;

        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .output()
            .await
            .with_context(|| format!("Failed to run recognizer command {:?}", self.program))?;

        if !output.status.success() {
            bail!(
                "recognizer command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!text.is_empty()).then_some(text))
    }

    fn name(&self) -> &str {
        "offline-command"
    }
}

/// Converts finished recordings (or live input) into text, trying the primary
/// backend once and the offline fallback once on transport failure.
pub struct Transcriber {
    primary: Box<dyn RecognitionBackend>,
    fallback: Option<Box<dyn RecognitionBackend>>,
}

impl Transcriber {
    pub fn new(
        primary: Box<dyn RecognitionBackend>,
        fallback: Option<Box<dyn RecognitionBackend>>,
    ) -> Self {
        Self { primary, fallback }
    }

    pub fn from_config(config: &SttConfig) -> Result<Self> {
        let primary = Box::new(WhisperApi::new(
            config.endpoint.clone(),
            config.api_key.clone().unwrap_or_default(),
            config.model.clone(),
        ));
        let fallback = config
            .fallback_command
            .as_deref()
            .map(CommandRecognizer::from_command)
            .transpose()?
            .map(|r| Box::new(r) as Box<dyn RecognitionBackend>);

        Ok(Self::new(primary, fallback))
    }

    /// Transcribe a complete WAV recording. All failure modes collapse to
    /// `None`; the distinction between "service down" and "not understood"
    /// only decides whether the fallback gets a try.
    pub async fn transcribe_file(&self, wav: &[u8]) -> Option<String> {
        match self.primary.transcribe(wav).await {
            Ok(Some(text)) => {
                info!("transcribed {} chars via {}", text.len(), self.primary.name());
                Some(text)
            }
            Ok(None) => {
                info!("could not understand audio");
                None
            }
            Err(e) => {
                warn!("{} recognition failed: {:#}", self.primary.name(), e);
                let fallback = self.fallback.as_ref()?;
                match fallback.transcribe(wav).await {
                    Ok(Some(text)) => {
                        info!("transcribed {} chars via {}", text.len(), fallback.name());
                        Some(text)
                    }
                    Ok(None) => None,
                    Err(e) => {
                        error!("{} recognition also failed: {:#}", fallback.name(), e);
                        None
                    }
                }
            }
        }
    }

    /// Listen on the given source until the recorder's silence or duration
    /// limit ends the take (bounded overall by `wait`), then transcribe.
    /// Returns `None` when nothing intelligible was captured in time.
    pub async fn transcribe_live(
        &self,
        recorder: &SilenceAwareRecorder,
        source: Box<dyn CaptureSource>,
        wait: Duration,
    ) -> Option<String> {
        if let Err(e) = recorder.start(source).await {
            error!("failed to start live capture: {:#}", e);
            return None;
        }

        let deadline = tokio::time::Instant::now() + wait;
        while recorder.is_recording() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let recording = match recorder.stop().await {
            Ok(Some(recording)) => recording,
            Ok(None) => {
                info!("no speech captured");
                return None;
            }
            Err(e) => {
                error!("live capture failed: {:#}", e);
                return None;
            }
        };

        self.transcribe_file(&recording.wav).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted backend: either a transcript, "not understood", or a
    /// transport failure, with a call counter.
    struct ScriptedBackend {
        outcome: Result<Option<&'static str>, &'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedBackend {
        fn new(
            outcome: Result<Option<&'static str>, &'static str>,
        ) -> (Box<dyn RecognitionBackend>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Box::new(Self {
                    outcome,
                    calls: Arc::clone(&calls),
                }),
                calls,
            )
        }
    }

    #[async_trait::async_trait]
    impl RecognitionBackend for ScriptedBackend {
        async fn transcribe(&self, _wav: &[u8]) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Ok(text) => Ok(text.map(str::to_string)),
                Err(msg) => anyhow::bail!(msg),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn primary_success_skips_the_fallback() {
        let (primary, _) = ScriptedBackend::new(Ok(Some("hello world")));
        let (fallback, fallback_calls) = ScriptedBackend::new(Ok(Some("unused")));
        let transcriber = Transcriber::new(primary, Some(fallback));

        let text = transcriber.transcribe_file(b"wav").await;
        assert_eq!(text.as_deref(), Some("hello world"));
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn not_understood_is_final_without_fallback() {
        // A healthy service that cannot understand the audio is a normal
        // "no result", not a reason to try the offline engine.
        let (primary, _) = ScriptedBackend::new(Ok(None));
        let (fallback, fallback_calls) = ScriptedBackend::new(Ok(Some("unused")));
        let transcriber = Transcriber::new(primary, Some(fallback));

        assert_eq!(transcriber.transcribe_file(b"wav").await, None);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transport_failure_falls_back_once() {
        let (primary, _) = ScriptedBackend::new(Err("service unreachable"));
        let (fallback, fallback_calls) = ScriptedBackend::new(Ok(Some("offline text")));
        let transcriber = Transcriber::new(primary, Some(fallback));

        let text = transcriber.transcribe_file(b"wav").await;
        assert_eq!(text.as_deref(), Some("offline text"));
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn both_backends_failing_yields_none() {
        let (primary, _) = ScriptedBackend::new(Err("down"));
        let (fallback, _) = ScriptedBackend::new(Err("also down"));
        let transcriber = Transcriber::new(primary, Some(fallback));

        assert_eq!(transcriber.transcribe_file(b"wav").await, None);
    }

    #[tokio::test]
    async fn transport_failure_without_fallback_yields_none() {
        let (primary, _) = ScriptedBackend::new(Err("down"));
        let transcriber = Transcriber::new(primary, None);

        assert_eq!(transcriber.transcribe_file(b"wav").await, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_recognizer_captures_stdout() {
        let recognizer = CommandRecognizer::from_command("echo transcript:").unwrap();
        let text = recognizer.transcribe(b"not really wav bytes").await.unwrap();
        assert!(text.unwrap().starts_with("transcript:"));
    }

    #[test]
    fn command_recognizer_parses_program_and_args() {
        let recognizer = CommandRecognizer::from_command("whisper-cli -m base.bin -nt").unwrap();
        assert_eq!(recognizer.program, "whisper-cli");
        assert_eq!(recognizer.args, vec!["-m", "base.bin", "-nt"]);

        assert!(CommandRecognizer::from_command("   ").is_err());
    }
}
