use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::Synthesizer;

enum QueueItem {
    Say { text: String, epoch: u64 },
    Shutdown,
}

/// Serializes speech synthesis through one background worker.
///
/// The engine is not safe for concurrent utterances, so a single consumer
/// drains a FIFO queue: utterances play in enqueue order and never overlap.
/// `stop` halts the in-progress utterance via the interrupt flag and bumps
/// the epoch, which invalidates everything enqueued before it — the worker
/// discards stale items instead of speaking them.
pub struct SpeechPlaybackQueue {
    tx: mpsc::UnboundedSender<QueueItem>,
    speaking: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
    epoch: Arc<AtomicU64>,
    interrupt: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SpeechPlaybackQueue {
    /// Spawn the worker. It owns the synthesis engine for the process
    /// lifetime, until `shutdown`.
    pub fn new(synthesizer: Box<dyn Synthesizer>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let speaking = Arc::new(AtomicBool::new(false));
        let queued = Arc::new(AtomicUsize::new(0));
        let epoch = Arc::new(AtomicU64::new(0));
        let interrupt = Arc::new(AtomicBool::new(false));

        let worker = tokio::spawn(worker_loop(
            rx,
            synthesizer,
            Arc::clone(&speaking),
            Arc::clone(&queued),
            Arc::clone(&epoch),
            Arc::clone(&interrupt),
        ));

        Self {
            tx,
            speaking,
            queued,
            epoch,
            interrupt,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue one utterance. Whitespace-only text is a no-op. Non-blocking.
    pub fn enqueue(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        self.queued.fetch_add(1, Ordering::SeqCst);
        let item = QueueItem::Say {
            text: text.to_string(),
            epoch: self.epoch.load(Ordering::SeqCst),
        };

        if self.tx.send(item).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            warn!("speech worker is shut down, dropping utterance");
        }
    }

    /// Halt the in-progress utterance and discard everything still queued.
    /// Safe to call while idle.
    pub fn stop(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.interrupt.store(true, Ordering::SeqCst);
        debug!("speech stopped, pending utterances discarded");
    }

    /// True while an utterance is playing or any are queued. Never blocks.
    pub fn is_busy(&self) -> bool {
        self.speaking.load(Ordering::SeqCst) || self.queued.load(Ordering::SeqCst) > 0
    }

    /// Poll until the queue goes idle, bounded by `timeout`.
    pub async fn wait_until_idle(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.is_busy() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Push the shutdown sentinel, join the worker with a bounded wait, then
    /// issue a final `stop` so no audio handle is left playing. Safe to call
    /// more than once.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(QueueItem::Shutdown);

        let handle = { self.worker.lock().await.take() };
        if let Some(handle) = handle {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("speech worker panicked: {}", e),
                Err(_) => warn!("speech worker did not exit in time"),
            }
        }

        self.stop();
    }
}

async fn worker_loop(
    mut rx: mpsc::UnboundedReceiver<QueueItem>,
    synthesizer: Box<dyn Synthesizer>,
    speaking: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
    epoch: Arc<AtomicU64>,
    interrupt: Arc<AtomicBool>,
) {
    info!("speech worker started");

    while let Some(item) = rx.recv().await {
        match item {
            QueueItem::Shutdown => break,
            QueueItem::Say {
                text,
                epoch: enqueued_at,
            } => {
                // `speaking` flips before the queue count drops so is_busy
                // stays true across the hand-off.
                speaking.store(true, Ordering::SeqCst);
                queued.fetch_sub(1, Ordering::SeqCst);
                interrupt.store(false, Ordering::SeqCst);

                if enqueued_at < epoch.load(Ordering::SeqCst) {
                    debug!("discarding utterance enqueued before stop");
                    speaking.store(false, Ordering::SeqCst);
                    continue;
                }

                info!("speaking utterance ({} chars)", text.len());
                if let Err(e) = synthesizer.speak(&text, Arc::clone(&interrupt)).await {
                    error!("speech synthesis failed: {:#}", e);
                }
                speaking.store(false, Ordering::SeqCst);
            }
        }
    }

    info!("speech worker stopped");
}
