use std::sync::Arc;

use crate::chat::ConversationStore;
use crate::config::Config;
use crate::llm::ResponseGenerator;
use crate::recorder::SilenceAwareRecorder;
use crate::speech::{SpeechPlaybackQueue, Transcriber};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub recorder: Arc<SilenceAwareRecorder>,
    pub transcriber: Arc<Transcriber>,
    pub responder: Arc<ResponseGenerator>,
    pub speech: Arc<SpeechPlaybackQueue>,
    pub history: Arc<ConversationStore>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        recorder: Arc<SilenceAwareRecorder>,
        transcriber: Arc<Transcriber>,
        responder: Arc<ResponseGenerator>,
        speech: Arc<SpeechPlaybackQueue>,
        history: Arc<ConversationStore>,
    ) -> Self {
        Self {
            config,
            recorder,
            transcriber,
            responder,
            speech,
            history,
        }
    }
}
