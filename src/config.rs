use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

/// Application configuration, loaded from an optional file plus a
/// `VOXCHAT_`-prefixed environment overlay (e.g. `VOXCHAT_LLM__API_KEY`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per capture chunk, per channel.
    pub chunk_size: usize,
    pub max_recording_secs: f64,
    /// RMS amplitude (i16 scale) below which a chunk counts as silent.
    pub silence_threshold: f64,
    /// Seconds of continuous silence that end a recording.
    pub silence_duration_secs: f64,
    /// Capture input: "microphone" or a path to a WAV file.
    pub input: String,
    /// When set, finished recordings are also written here as WAV files.
    pub recordings_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Whisper-compatible transcription endpoint.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Offline recognizer command, e.g. "whisper-cli -m models/base.bin".
    /// The WAV path is appended as the final argument.
    pub fallback_command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "gemini" or "openrouter".
    pub provider: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Base URL override; empty selects the provider default.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// OpenAI-compatible speech synthesis endpoint.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    /// Playback speed multiplier.
    pub rate: f32,
    /// Output gain, 0.0 to 1.0.
    pub volume: f32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            chunk_size: 1024,
            max_recording_secs: 30.0,
            silence_threshold: 500.0,
            silence_duration_secs: 2.0,
            input: "microphone".to_string(),
            recordings_dir: None,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            api_key: None,
            model: "whisper-1".to_string(),
            fallback_command: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/audio/speech".to_string(),
            api_key: None,
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            rate: 1.0,
            volume: 0.9,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            audio: AudioConfig::default(),
            stt: SttConfig::default(),
            llm: LlmConfig::default(),
            tts: TtsConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("VOXCHAT").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Validate required settings. A missing LLM credential is fatal; missing
    /// speech credentials only degrade the voice paths.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.as_deref().unwrap_or("").is_empty() {
            bail!("llm.api_key is required (set VOXCHAT_LLM__API_KEY)");
        }
        match self.llm.provider.as_str() {
            "gemini" | "openrouter" => {}
            other => bail!(
                "unknown llm.provider {:?} (expected gemini or openrouter)",
                other
            ),
        }
        if self.audio.sample_rate == 0 || self.audio.channels == 0 || self.audio.chunk_size == 0 {
            bail!("audio.sample_rate, audio.channels and audio.chunk_size must be non-zero");
        }
        if self.stt.api_key.as_deref().unwrap_or("").is_empty()
            && self.stt.fallback_command.is_none()
        {
            warn!("no stt.api_key or stt.fallback_command configured, voice transcription will fail");
        }
        if self.tts.api_key.as_deref().unwrap_or("").is_empty() {
            warn!("no tts.api_key configured, responses will not be spoken");
        }
        Ok(())
    }
}
