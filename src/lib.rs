pub mod audio;
pub mod chat;
pub mod config;
pub mod console;
pub mod http;
pub mod llm;
pub mod recorder;
pub mod speech;

pub use audio::{AudioFrame, CaptureConfig, CaptureSource, CaptureSourceFactory};
pub use chat::{ConversationStore, Role, Turn};
pub use config::Config;
pub use http::{create_router, AppState};
pub use llm::ResponseGenerator;
pub use recorder::{Recording, SilenceAwareRecorder};
pub use speech::{SpeechPlaybackQueue, Synthesizer, Transcriber};
