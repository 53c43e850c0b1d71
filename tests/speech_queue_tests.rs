// Integration tests for the speech playback queue
//
// A mock synthesis engine records what was actually spoken and honors the
// interrupt flag the way a real engine must, so ordering, busy-tracking,
// stop, and shutdown semantics can be verified without an audio device.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use voxchat::speech::{SpeechPlaybackQueue, Synthesizer};

struct MockSynthesizer {
    spoken: Arc<Mutex<Vec<String>>>,
    halted: Arc<AtomicUsize>,
    utterance: Duration,
}

impl MockSynthesizer {
    fn new(utterance: Duration) -> (Self, Arc<Mutex<Vec<String>>>, Arc<AtomicUsize>) {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let halted = Arc::new(AtomicUsize::new(0));
        (
            Self {
                spoken: Arc::clone(&spoken),
                halted: Arc::clone(&halted),
                utterance,
            },
            spoken,
            halted,
        )
    }
}

#[async_trait::async_trait]
impl Synthesizer for MockSynthesizer {
    async fn speak(&self, text: &str, interrupt: Arc<AtomicBool>) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.utterance;
        while tokio::time::Instant::now() < deadline {
            if interrupt.load(Ordering::SeqCst) {
                self.halted.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn utterances_play_in_enqueue_order() {
    let (synth, spoken, _) = MockSynthesizer::new(Duration::from_millis(20));
    let queue = SpeechPlaybackQueue::new(Box::new(synth));

    queue.enqueue("a");
    queue.enqueue("b");
    queue.enqueue("c");
    assert!(queue.is_busy());

    queue.wait_until_idle(Duration::from_secs(5)).await;

    assert!(!queue.is_busy());
    assert_eq!(*spoken.lock().unwrap(), vec!["a", "b", "c"]);

    queue.shutdown().await;
}

#[tokio::test]
async fn busy_covers_the_queued_backlog() {
    let (synth, _, _) = MockSynthesizer::new(Duration::from_millis(60));
    let queue = SpeechPlaybackQueue::new(Box::new(synth));

    queue.enqueue("first");
    queue.enqueue("second");

    // Mid-first-utterance the queue must still report busy for the backlog.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(queue.is_busy());

    queue.wait_until_idle(Duration::from_secs(5)).await;
    assert!(!queue.is_busy());

    queue.shutdown().await;
}

#[tokio::test]
async fn whitespace_utterances_are_ignored() {
    let (synth, spoken, _) = MockSynthesizer::new(Duration::from_millis(5));
    let queue = SpeechPlaybackQueue::new(Box::new(synth));

    queue.enqueue("");
    queue.enqueue("   \n\t");
    assert!(!queue.is_busy());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(spoken.lock().unwrap().is_empty());

    queue.shutdown().await;
}

#[tokio::test]
async fn stop_halts_playback_and_discards_the_backlog() {
    let (synth, spoken, halted) = MockSynthesizer::new(Duration::from_millis(500));
    let queue = SpeechPlaybackQueue::new(Box::new(synth));

    queue.enqueue("a");
    queue.enqueue("b");
    queue.enqueue("c");

    // Let "a" start speaking, then cut everything off.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(queue.is_busy());
    queue.stop();

    queue.wait_until_idle(Duration::from_secs(5)).await;
    assert!(!queue.is_busy());
    assert_eq!(halted.load(Ordering::SeqCst), 1, "only 'a' was mid-flight");
    assert!(spoken.lock().unwrap().is_empty(), "nothing finished normally");

    // The queue keeps working for utterances enqueued after the stop.
    queue.enqueue("d");
    queue.wait_until_idle(Duration::from_secs(5)).await;
    assert_eq!(*spoken.lock().unwrap(), vec!["d"]);

    queue.shutdown().await;
}

#[tokio::test]
async fn stop_while_idle_is_a_no_op() {
    let (synth, spoken, _) = MockSynthesizer::new(Duration::from_millis(10));
    let queue = SpeechPlaybackQueue::new(Box::new(synth));

    queue.stop();
    assert!(!queue.is_busy());

    // A stop with nothing in flight must not eat the next utterance.
    queue.enqueue("after");
    queue.wait_until_idle(Duration::from_secs(5)).await;
    assert_eq!(*spoken.lock().unwrap(), vec!["after"]);

    queue.shutdown().await;
}

#[tokio::test]
async fn shutdown_is_idempotent_and_final() {
    let (synth, spoken, _) = MockSynthesizer::new(Duration::from_millis(10));
    let queue = SpeechPlaybackQueue::new(Box::new(synth));

    queue.enqueue("last words");
    queue.shutdown().await;
    queue.shutdown().await;

    // The worker spoke what was queued before the sentinel, then exited;
    // later enqueues go nowhere.
    assert_eq!(*spoken.lock().unwrap(), vec!["last words"]);
    queue.enqueue("too late");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*spoken.lock().unwrap(), vec!["last words"]);
    assert!(!queue.is_busy());
}
