use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use voxchat::chat::ConversationStore;
use voxchat::config::Config;
use voxchat::console;
use voxchat::http::{create_router, AppState};
use voxchat::llm::ResponseGenerator;
use voxchat::recorder::{RecorderConfig, SilenceAwareRecorder};
use voxchat::speech::{SpeechPlaybackQueue, SynthesizerFactory, Transcriber};

#[derive(Parser)]
#[command(name = "voxchat", about = "Voice/text chat service", version)]
struct Cli {
    /// Config file base path (extension optional; env vars override)
    #[arg(long, default_value = "config/voxchat")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Run the interactive console loop
    Console,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    config.validate()?;
    let config = Arc::new(config);

    info!("voxchat v{}", env!("CARGO_PKG_VERSION"));

    let recorder = Arc::new(SilenceAwareRecorder::new(RecorderConfig {
        silence_threshold: config.audio.silence_threshold,
        silence_duration: Duration::from_secs_f64(config.audio.silence_duration_secs),
        max_duration: Duration::from_secs_f64(config.audio.max_recording_secs),
        ..RecorderConfig::default()
    }));
    let transcriber = Arc::new(Transcriber::from_config(&config.stt)?);
    let responder = Arc::new(ResponseGenerator::from_config(&config.llm)?);
    let speech = Arc::new(SpeechPlaybackQueue::new(SynthesizerFactory::create(
        &config.tts,
    )));
    let history = Arc::new(ConversationStore::new());

    match responder.test_connection().await {
        Ok(()) => info!("AI endpoint reachable"),
        Err(e) => warn!("AI endpoint connection test failed: {:#}", e),
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let state = AppState::new(
                Arc::clone(&config),
                Arc::clone(&recorder),
                Arc::clone(&transcriber),
                Arc::clone(&responder),
                Arc::clone(&speech),
                Arc::clone(&history),
            );

            let addr = format!("{}:{}", config.http.bind, config.http.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;

            info!("HTTP server listening on {}", addr);

            axum::serve(listener, create_router(state))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("HTTP server error")?;
        }
        Command::Console => {
            console::run(
                Arc::clone(&config),
                Arc::clone(&recorder),
                transcriber,
                responder,
                Arc::clone(&speech),
                history,
            )
            .await?;
        }
    }

    // Release the capture device and the speech worker before exit.
    if let Err(e) = recorder.stop().await {
        error!("failed to stop recorder: {:#}", e);
    }
    speech.shutdown().await;
    info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
    }
    info!("shutdown signal received");
}
