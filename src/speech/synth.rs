use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::TtsConfig;

/// A speech synthesis engine.
///
/// `speak` is the playback queue's one blocking step: it returns once the
/// utterance has finished playing, failed, or been halted. Implementations
/// must observe `interrupt` promptly so a stop request cuts audio off
/// mid-utterance rather than at the next boundary.
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    async fn speak(&self, text: &str, interrupt: Arc<AtomicBool>) -> Result<()>;
}

/// Stand-in engine used when synthesis is unavailable; utterances are
/// consumed without producing audio, and the rest of the app runs normally.
pub struct NullSynthesizer;

#[async_trait::async_trait]
impl Synthesizer for NullSynthesizer {
    async fn speak(&self, text: &str, _interrupt: Arc<AtomicBool>) -> Result<()> {
        debug!("no synthesis engine, dropping utterance ({} chars)", text.len());
        Ok(())
    }
}

/// Selects the synthesis engine once at startup.
pub struct SynthesizerFactory;

impl SynthesizerFactory {
    pub fn create(config: &TtsConfig) -> Box<dyn Synthesizer> {
        #[cfg(feature = "audio")]
        {
            match config.api_key.as_deref() {
                Some(key) if !key.is_empty() => {
                    return Box::new(HttpTts::new(config, key.to_string()));
                }
                _ => warn!("no tts.api_key configured, responses will not be spoken"),
            }
        }

        #[cfg(not(feature = "audio"))]
        {
            let _ = config;
            warn!("built without the \"audio\" feature, responses will not be spoken");
        }

        Box::new(NullSynthesizer)
    }
}

#[cfg(feature = "audio")]
pub use http_tts::HttpTts;

#[cfg(feature = "audio")]
mod http_tts {
    use super::*;
    use anyhow::{bail, Context};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::audio::wav;
    use crate::speech::playback;

    /// Synthesizes speech through an OpenAI-compatible endpoint and plays the
    /// returned WAV on the default output device.
    pub struct HttpTts {
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
        model: String,
        voice: String,
        rate: f32,
        volume: f32,
    }

    impl HttpTts {
        pub fn new(config: &TtsConfig, api_key: String) -> Self {
            Self {
                client: reqwest::Client::builder()
                    .timeout(Duration::from_secs(30))
                    .build()
                    .unwrap_or_default(),
                endpoint: config.endpoint.clone(),
                api_key,
                model: config.model.clone(),
                voice: config.voice.clone(),
                rate: config.rate,
                volume: config.volume.clamp(0.0, 1.0),
            }
        }

        async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
            #[derive(serde::Serialize)]
            struct TtsRequest<'a> {
                model: &'a str,
                input: &'a str,
                voice: &'a str,
                speed: f32,
                response_format: &'a str,
            }

            let request = TtsRequest {
                model: &self.model,
                input: text,
                voice: &self.voice,
                speed: self.rate,
                response_format: "wav",
            };

            let response = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await
                .context("synthesis request failed")?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                bail!("synthesis service error {}: {}", status, body);
            }

            Ok(response.bytes().await?.to_vec())
        }
    }

    #[async_trait::async_trait]
    impl Synthesizer for HttpTts {
        async fn speak(&self, text: &str, interrupt: Arc<AtomicBool>) -> Result<()> {
            let audio = self.synthesize(text).await?;

            // A stop that raced the synthesis call wins before any audio plays.
            if interrupt.load(Ordering::SeqCst) {
                debug!("utterance halted before playback");
                return Ok(());
            }

            let (info, samples) = wav::decode(&audio)?;
            let volume = self.volume;

            tokio::task::spawn_blocking(move || {
                playback::play(&samples, info.sample_rate, info.channels, volume, &interrupt)
            })
            .await
            .context("playback task panicked")?
        }
    }
}
