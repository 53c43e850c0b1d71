//! Interactive console mode
//!
//! A line-driven loop over the same components the HTTP front end uses:
//! `voice` records and transcribes from the configured input, `text` sends a
//! typed message, `quit` exits. Replies are spoken to completion before the
//! next prompt.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

use crate::audio::{CaptureConfig, CaptureSourceFactory};
use crate::chat::{ConversationStore, Role};
use crate::config::Config;
use crate::llm::ResponseGenerator;
use crate::recorder::SilenceAwareRecorder;
use crate::speech::{SpeechPlaybackQueue, Transcriber};

pub async fn run(
    config: Arc<Config>,
    recorder: Arc<SilenceAwareRecorder>,
    transcriber: Arc<Transcriber>,
    responder: Arc<ResponseGenerator>,
    speech: Arc<SpeechPlaybackQueue>,
    history: Arc<ConversationStore>,
) -> Result<()> {
    println!("==================================================");
    println!("VOXCHAT - CONSOLE MODE");
    println!("Commands:");
    println!("  voice - record and send a voice message");
    println!("  text  - send a text message");
    println!("  quit  - exit");
    println!("==================================================");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt("\nEnter command (voice/text/quit): ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "quit" => break,
            "voice" => {
                let audio = &config.audio;
                let capture_config = CaptureConfig {
                    sample_rate: audio.sample_rate,
                    channels: audio.channels,
                    chunk_size: audio.chunk_size,
                };

                let source = match CaptureSourceFactory::create(&audio.input, capture_config) {
                    Ok(source) => source,
                    Err(e) => {
                        error!("cannot open capture source: {:#}", e);
                        println!("Voice input is unavailable.");
                        continue;
                    }
                };

                println!(
                    "Listening... (stops after {:.0}s of silence)",
                    audio.silence_duration_secs
                );

                // Bound the wait by the recording cap plus transcription slack.
                let wait = Duration::from_secs_f64(audio.max_recording_secs + 5.0);
                let Some(text) = transcriber.transcribe_live(&recorder, source, wait).await
                else {
                    println!("No speech detected or transcription failed.");
                    continue;
                };

                println!("You said: {}", text);
                exchange(&text, &responder, &history, &speech).await;
            }
            "text" => {
                prompt("Enter your message: ")?;
                let Some(message) = lines.next_line().await? else {
                    break;
                };
                let message = message.trim();
                if message.is_empty() {
                    continue;
                }

                exchange(message, &responder, &history, &speech).await;
            }
            "" => continue,
            _ => println!("Invalid command. Use 'voice', 'text', or 'quit'."),
        }
    }

    Ok(())
}

fn prompt(text: &str) -> Result<()> {
    print!("{}", text);
    std::io::stdout().flush()?;
    Ok(())
}

async fn exchange(
    text: &str,
    responder: &ResponseGenerator,
    history: &ConversationStore,
    speech: &SpeechPlaybackQueue,
) {
    let snapshot = history.snapshot().await;
    let reply = responder.generate(text, &snapshot).await;

    println!("AI: {}", reply);

    history.append(Role::User, text).await;
    history.append(Role::Assistant, reply.clone()).await;

    // Speak to completion so playback does not trample the next prompt.
    speech.enqueue(&reply);
    speech.wait_until_idle(Duration::from_secs(120)).await;
}
