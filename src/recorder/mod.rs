//! Silence-aware recording sessions
//!
//! A session captures frames from a `CaptureSource` until silence, a duration
//! cap, or an explicit stop ends it, then serializes the take to WAV.

mod session;

pub use session::{
    rms_amplitude, AlreadyRecording, RecorderConfig, Recording, SilenceAwareRecorder, StopReason,
};
