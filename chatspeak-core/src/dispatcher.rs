//! Paced, single-flight speech dispatch
//!
//! Driven by the host tick. Each tick starts at most one utterance, never
//! while another is still being spoken, and never sooner than the configured
//! interval after the previous one started. The tick itself never waits on
//! the synthesizer: speech runs on its own task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ChatConfig;
use crate::display::Display;
use crate::pitch::to_synthesis_pitch;
use crate::queue::MessageQueue;
use crate::stats::PipelineStats;
use crate::synth::{FailureReporter, SpeechRequest, Synthesizer};

/// Upper bound on waiting for an in-flight utterance when disabling
pub const SPEECH_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Pipeline is not running
    Disabled,
    /// An utterance is still in flight
    Busy,
    /// The minimum interval since the last start has not elapsed
    Waiting,
    /// Nothing queued
    Empty,
    /// An utterance was started
    Dispatched,
}

enum Speech {
    Idle,
    Speaking(JoinHandle<()>),
}

pub struct Dispatcher {
    synth: Arc<dyn Synthesizer>,
    display: Display,
    speech: Speech,
    last_dispatch: Option<Instant>,
    reporter: FailureReporter,
    stats: Arc<PipelineStats>,
}

impl Dispatcher {
    pub fn new(synth: Arc<dyn Synthesizer>, display: Display, stats: Arc<PipelineStats>) -> Self {
        Self {
            synth,
            display,
            speech: Speech::Idle,
            last_dispatch: None,
            reporter: FailureReporter::new(),
            stats,
        }
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut Display {
        &mut self.display
    }

    /// True while a synthesis task exists and has not finished.
    pub fn is_speaking(&self) -> bool {
        match &self.speech {
            Speech::Idle => false,
            Speech::Speaking(handle) => !handle.is_finished(),
        }
    }

    pub fn tick(&mut self, queue: &mut MessageQueue, config: &ChatConfig, enabled: bool) -> DispatchOutcome {
        if !enabled {
            return DispatchOutcome::Disabled;
        }

        if self.is_speaking() {
            return DispatchOutcome::Busy;
        }

        let now = Instant::now();
        if let Some(last) = self.last_dispatch {
            if now.duration_since(last) < config.speak_interval {
                return DispatchOutcome::Waiting;
            }
        }

        let Some(message) = queue.try_dequeue() else {
            return DispatchOutcome::Empty;
        };

        self.display.show(&message.display_text);
        self.last_dispatch = Some(now);
        self.stats.utterance_started();

        let request = SpeechRequest {
            text: message.speak_text,
            rate: config.speech_rate,
            pitch: to_synthesis_pitch(message.pitch, config.pitch),
        };
        debug!(pitch = request.pitch, "Speaking: {}", request.text);

        let synth = Arc::clone(&self.synth);
        let reporter = self.reporter.clone();
        let stats = Arc::clone(&self.stats);
        let handle = tokio::spawn(async move {
            match synth.speak(&request).await {
                Ok(()) => reporter.success(),
                Err(e) => {
                    stats.synthesis_failed();
                    reporter.report(&e);
                }
            }
        });
        self.speech = Speech::Speaking(handle);

        DispatchOutcome::Dispatched
    }

    /// Hide the overlay once speech has finished and nothing is queued.
    pub fn refresh_display(&mut self, queue: &MessageQueue) {
        if !self.display.is_visible() || self.is_speaking() || !queue.is_empty() {
            return;
        }
        self.display.hide();
    }

    /// Wait (bounded) for the in-flight utterance, aborting it on timeout.
    pub async fn wait_idle(&mut self, timeout: Duration) {
        let Speech::Speaking(mut handle) = std::mem::replace(&mut self.speech, Speech::Idle) else {
            return;
        };

        if tokio::time::timeout(timeout, &mut handle).await.is_err() {
            warn!("Speech still running after {:?}; aborting", timeout);
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use crate::config::ChatSettings;
    use crate::display::{ChannelDisplay, DisplayCommand};
    use crate::error::SynthesisError;
    use crate::queue::{message_queue, QueueProducer, QueuedMessage};

    /// Blocks each utterance until a permit is released
    struct GatedSynth {
        started: AtomicUsize,
        gate: Semaphore,
    }

    #[async_trait]
    impl Synthesizer for GatedSynth {
        async fn speak(&self, _request: &SpeechRequest) -> Result<(), SynthesisError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let permit = self.gate.acquire().await.map_err(|_| {
                SynthesisError::Io(std::io::Error::other("gate closed"))
            })?;
            permit.forget();
            Ok(())
        }
    }

    struct Fixture {
        synth: Arc<GatedSynth>,
        dispatcher: Dispatcher,
        producer: QueueProducer,
        queue: MessageQueue,
        display_rx: tokio::sync::mpsc::UnboundedReceiver<DisplayCommand>,
        config: ChatConfig,
    }

    fn fixture() -> Fixture {
        let synth = Arc::new(GatedSynth {
            started: AtomicUsize::new(0),
            gate: Semaphore::new(0),
        });
        let (sink, display_rx) = ChannelDisplay::new();
        let mut display = Display::new(Arc::new(sink));
        display.retarget("ChatText", "");
        let dispatcher = Dispatcher::new(
            synth.clone(),
            display,
            Arc::new(PipelineStats::default()),
        );
        let (producer, queue) = message_queue(16);
        let config = ChatSettings {
            speak_interval: 2.0,
            ..Default::default()
        }
        .normalize();

        Fixture {
            synth,
            dispatcher,
            producer,
            queue,
            display_rx,
            config,
        }
    }

    fn message(text: &str) -> QueuedMessage {
        QueuedMessage {
            speak_text: text.to_string(),
            pitch: 50,
            display_text: format!("user: {}", text),
        }
    }

    /// Let spawned speech tasks run
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight() {
        let mut f = fixture();
        f.producer.try_enqueue(message("one"));
        f.producer.try_enqueue(message("two"));

        assert_eq!(f.dispatcher.tick(&mut f.queue, &f.config, true), DispatchOutcome::Dispatched);
        settle().await;

        // long past the interval, but the first utterance is still running
        tokio::time::advance(Duration::from_secs(30)).await;
        for _ in 0..100 {
            assert_eq!(f.dispatcher.tick(&mut f.queue, &f.config, true), DispatchOutcome::Busy);
        }
        assert_eq!(f.synth.started.load(Ordering::SeqCst), 1);
        assert_eq!(f.queue.len(), 1);

        f.synth.gate.add_permits(1);
        settle().await;
        assert!(!f.dispatcher.is_speaking());
        assert_eq!(f.dispatcher.tick(&mut f.queue, &f.config, true), DispatchOutcome::Dispatched);
        settle().await;
        assert_eq!(f.synth.started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_minimum_interval() {
        let mut f = fixture();
        f.synth.gate.add_permits(10);
        f.producer.try_enqueue(message("one"));
        f.producer.try_enqueue(message("two"));

        assert_eq!(f.dispatcher.tick(&mut f.queue, &f.config, true), DispatchOutcome::Dispatched);
        settle().await;
        assert!(!f.dispatcher.is_speaking());

        tokio::time::advance(Duration::from_millis(1999)).await;
        assert_eq!(f.dispatcher.tick(&mut f.queue, &f.config, true), DispatchOutcome::Waiting);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(f.dispatcher.tick(&mut f.queue, &f.config, true), DispatchOutcome::Dispatched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_and_empty() {
        let mut f = fixture();
        assert_eq!(f.dispatcher.tick(&mut f.queue, &f.config, true), DispatchOutcome::Empty);

        f.producer.try_enqueue(message("one"));
        assert_eq!(f.dispatcher.tick(&mut f.queue, &f.config, false), DispatchOutcome::Disabled);
        assert_eq!(f.queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_display_shown_then_hidden() {
        let mut f = fixture();
        f.producer.try_enqueue(message("hello"));

        f.dispatcher.tick(&mut f.queue, &f.config, true);
        assert_eq!(
            f.display_rx.try_recv().unwrap(),
            DisplayCommand::SetText {
                source: "ChatText".to_string(),
                text: "user: hello".to_string()
            }
        );
        assert!(f.dispatcher.display().is_visible());

        // still speaking: stays visible
        settle().await;
        f.dispatcher.refresh_display(&f.queue);
        assert!(f.dispatcher.display().is_visible());

        f.synth.gate.add_permits(1);
        settle().await;
        f.dispatcher.refresh_display(&f.queue);
        assert!(!f.dispatcher.display().is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_idle_aborts_stuck_speech() {
        let mut f = fixture();
        f.producer.try_enqueue(message("stuck"));
        f.dispatcher.tick(&mut f.queue, &f.config, true);
        settle().await;

        f.dispatcher.wait_idle(SPEECH_JOIN_TIMEOUT).await;
        assert!(!f.dispatcher.is_speaking());
    }

    struct FailingSynth;

    #[async_trait]
    impl Synthesizer for FailingSynth {
        async fn speak(&self, _request: &SpeechRequest) -> Result<(), SynthesisError> {
            Err(SynthesisError::BinaryMissing("espeak-ng".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_retry_message() {
        let (sink, _rx) = ChannelDisplay::new();
        let stats = Arc::new(PipelineStats::default());
        let mut dispatcher = Dispatcher::new(
            Arc::new(FailingSynth),
            Display::new(Arc::new(sink)),
            stats.clone(),
        );
        let (producer, mut queue) = message_queue(4);
        let config = ChatConfig::default();
        producer.try_enqueue(message("lost"));

        assert_eq!(dispatcher.tick(&mut queue, &config, true), DispatchOutcome::Dispatched);
        settle().await;
        assert!(queue.is_empty());
        assert_eq!(stats.snapshot().synthesis_failures, 1);
    }
}
