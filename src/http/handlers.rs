use super::state::AppState;
use crate::audio::{CaptureConfig, CaptureSourceFactory};
use crate::chat::{Role, Turn};
use crate::recorder::{AlreadyRecording, Recording};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendTextRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct VoiceExchangeResponse {
    pub success: bool,
    pub transcribed_text: String,
    pub ai_response: String,
}

#[derive(Debug, Serialize)]
pub struct TextExchangeResponse {
    pub success: bool,
    pub ai_response: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub recording: bool,
    pub speaking: bool,
    pub conversation_length: usize,
}

fn failure(status: StatusCode, error: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /start_recording
/// Begin a silence-aware capture session
pub async fn start_recording(State(state): State<AppState>) -> impl IntoResponse {
    let audio = &state.config.audio;
    let capture_config = CaptureConfig {
        sample_rate: audio.sample_rate,
        channels: audio.channels,
        chunk_size: audio.chunk_size,
    };

    let source = match CaptureSourceFactory::create(&audio.input, capture_config) {
        Ok(source) => source,
        Err(e) => {
            error!("failed to create capture source: {:#}", e);
            return failure(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e));
        }
    };

    match state.recorder.start(source).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                success: true,
                message: "Recording started".to_string(),
            }),
        )
            .into_response(),
        Err(e) if e.is::<AlreadyRecording>() => {
            failure(StatusCode::CONFLICT, "Already recording")
        }
        Err(e) => {
            error!("failed to start recording: {:#}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
    }
}

/// POST /stop_recording
/// Finish the capture session and run the voice exchange pipeline:
/// transcribe, generate a reply, record both turns, queue speech
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    let recording = match state.recorder.stop().await {
        Ok(recording) => recording,
        Err(e) => {
            error!("failed to stop recording: {:#}", e);
            return failure(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e));
        }
    };

    let Some(recording) = recording else {
        return failure(StatusCode::OK, "No audio recorded");
    };

    info!(
        "recording finished: {:.1}s, {} samples ({:?})",
        recording.duration_secs, recording.samples, recording.stop_reason
    );

    if let Some(dir) = &state.config.audio.recordings_dir {
        persist_recording(dir, &recording).await;
    }

    let Some(transcribed) = state.transcriber.transcribe_file(&recording.wav).await else {
        return failure(StatusCode::OK, "Could not transcribe audio");
    };

    let ai_response = run_exchange(&state, &transcribed).await;

    (
        StatusCode::OK,
        Json(VoiceExchangeResponse {
            success: true,
            transcribed_text: transcribed,
            ai_response,
        }),
    )
        .into_response()
}

/// POST /send_text
/// Text-only exchange through the same reply pipeline
pub async fn send_text(
    State(state): State<AppState>,
    Json(req): Json<SendTextRequest>,
) -> impl IntoResponse {
    let text = req.text.trim();
    if text.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "No text provided");
    }

    let ai_response = run_exchange(&state, text).await;

    (
        StatusCode::OK,
        Json(TextExchangeResponse {
            success: true,
            ai_response,
        }),
    )
        .into_response()
}

/// POST /stop_speaking
/// Halt the current utterance and drain the speech queue
pub async fn stop_speaking(State(state): State<AppState>) -> impl IntoResponse {
    state.speech.stop();
    (
        StatusCode::OK,
        Json(MessageResponse {
            success: true,
            message: "Speech stopped".to_string(),
        }),
    )
}

/// POST /clear_history
/// Empty the conversation log
pub async fn clear_history(State(state): State<AppState>) -> impl IntoResponse {
    state.history.clear().await;
    (
        StatusCode::OK,
        Json(MessageResponse {
            success: true,
            message: "History cleared".to_string(),
        }),
    )
}

/// GET /status
/// Liveness probe for the front end
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(StatusResponse {
            recording: state.recorder.is_recording(),
            speaking: state.speech.is_busy(),
            conversation_length: state.history.len().await,
        }),
    )
}

/// GET /history
/// Conversation transcript, oldest first
pub async fn get_history(State(state): State<AppState>) -> impl IntoResponse {
    let turns: Vec<Turn> = state.history.snapshot().await;
    (StatusCode::OK, Json(turns))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Generate the reply, record both turns, and queue the spoken response.
async fn run_exchange(state: &AppState, user_text: &str) -> String {
    let history = state.history.snapshot().await;
    let ai_response = state.responder.generate(user_text, &history).await;

    state.history.append(Role::User, user_text).await;
    state
        .history
        .append(Role::Assistant, ai_response.clone())
        .await;

    state.speech.enqueue(&ai_response);

    ai_response
}

/// Best-effort persistence of the finished take; failures are logged, never
/// surfaced to the caller.
async fn persist_recording(dir: &Path, recording: &Recording) {
    let filename = format!(
        "recording-{}.wav",
        chrono::Utc::now().format("%Y%m%d-%H%M%S%.3f")
    );
    let path = dir.join(filename);

    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!("failed to create recordings dir {}: {}", dir.display(), e);
        return;
    }
    match tokio::fs::write(&path, &recording.wav).await {
        Ok(()) => info!("recording saved to {}", path.display()),
        Err(e) => warn!("failed to save recording to {}: {}", path.display(), e),
    }
}
