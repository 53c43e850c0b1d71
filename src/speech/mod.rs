//! Speech input and output
//!
//! Transcription (networked primary with an offline fallback), speech
//! synthesis engines, and the single-consumer playback queue that keeps
//! utterances from overlapping.

mod queue;
mod stt;
mod synth;

#[cfg(feature = "audio")]
mod playback;

pub use queue::SpeechPlaybackQueue;
pub use stt::{CommandRecognizer, RecognitionBackend, Transcriber, WhisperApi};
pub use synth::{NullSynthesizer, Synthesizer, SynthesizerFactory};

#[cfg(feature = "audio")]
pub use synth::HttpTts;
