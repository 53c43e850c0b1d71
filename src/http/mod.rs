//! HTTP API server for the browser front end
//!
//! Thin adapters over the recorder, transcriber, response generator, speech
//! queue, and conversation store:
//! - POST /start_recording - begin a capture session
//! - POST /stop_recording  - finish capture, transcribe, reply, speak
//! - POST /send_text       - text-only exchange
//! - POST /stop_speaking   - halt playback and drain the speech queue
//! - POST /clear_history   - empty the conversation log
//! - GET  /status          - recording/speaking/history probe
//! - GET  /history         - conversation transcript
//! - GET  /health          - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
