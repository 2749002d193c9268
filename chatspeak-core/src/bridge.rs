//! The chat-to-speech bridge context
//!
//! `Bridge` owns every piece of pipeline state: the active configuration,
//! the connection worker, both cooldown maps, the queue consumer and the
//! dispatcher. The host calls [`Bridge::tick`] periodically from a single
//! task; configuration changes go through [`Bridge::submit_config`] and take
//! effect on a later tick once the debouncer releases them.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::connection::{Backoff, ConnectionManager, ConnectionState, Endpoint};
use crate::debounce::{ConfigDebouncer, ConfigUpdate, DEFAULT_DEBOUNCE};
use crate::dispatcher::{DispatchOutcome, Dispatcher, SPEECH_JOIN_TIMEOUT};
use crate::display::{Display, DisplaySink};
use crate::intake::ChatIntake;
use crate::queue::{message_queue, MessageQueue, QueueProducer, DEFAULT_QUEUE_CAPACITY};
use crate::rate_limit::Cooldowns;
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::synth::Synthesizer;

/// Construction parameters that are not part of the user configuration
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub endpoint: Endpoint,
    pub queue_capacity: usize,
    pub debounce: Duration,
    pub backoff: Backoff,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            debounce: DEFAULT_DEBOUNCE,
            backoff: Backoff::default(),
        }
    }
}

/// Point-in-time view for the control surface
#[derive(Debug, Clone, Serialize)]
pub struct BridgeStatus {
    pub state: ConnectionState,
    pub enabled: bool,
    pub channel: String,
    pub queue_len: usize,
    pub queue_capacity: usize,
    pub speaking: bool,
    pub display_visible: bool,
    pub config_pending: bool,
    pub stats: StatsSnapshot,
}

pub struct Bridge {
    active: Arc<ChatConfig>,
    /// Latest snapshot handed to the debouncer, applied or not
    submitted: ChatConfig,
    connection: ConnectionManager,
    cooldowns: Arc<Mutex<Cooldowns>>,
    producer: QueueProducer,
    queue: MessageQueue,
    dispatcher: Dispatcher,
    debouncer: ConfigDebouncer,
    stats: Arc<PipelineStats>,
}

impl Bridge {
    pub fn new(
        options: BridgeOptions,
        synth: Arc<dyn Synthesizer>,
        sink: Arc<dyn DisplaySink>,
    ) -> Self {
        let stats = Arc::new(PipelineStats::default());
        let active = ChatConfig::default();
        let cooldowns = Cooldowns::new(active.per_user_timeout, active.greet_timeout);
        let (producer, queue) = message_queue(options.queue_capacity);

        let connection = ConnectionManager::new(options.endpoint, Arc::clone(&stats))
            .with_backoff(options.backoff);
        let dispatcher = Dispatcher::new(synth, Display::new(sink), Arc::clone(&stats));

        Self {
            submitted: active.clone(),
            active: Arc::new(active),
            connection,
            cooldowns: Arc::new(Mutex::new(cooldowns)),
            producer,
            queue,
            dispatcher,
            debouncer: ConfigDebouncer::new(options.debounce),
            stats,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.active
    }

    pub fn is_enabled(&self) -> bool {
        self.active.enabled
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Queue `config` for applying. Switching `enabled` always applies on
    /// the next tick; other edits wait for the debounce delay.
    pub fn submit_config(&mut self, config: ChatConfig) {
        let force = config.enabled != self.submitted.enabled;
        self.submit_config_with(config, force);
    }

    pub fn submit_config_with(&mut self, config: ChatConfig, force: bool) {
        debug!(force, channel = %config.channel, "Configuration submitted");
        self.submitted = config.clone();
        self.debouncer.submit(config, force);
    }

    /// One host tick: apply a due configuration, then pace the dispatcher.
    pub async fn tick(&mut self) -> DispatchOutcome {
        if let Some(update) = self.debouncer.poll(Instant::now()) {
            self.apply(update).await;
        }

        let config = Arc::clone(&self.active);
        let outcome = self.dispatcher.tick(&mut self.queue, &config, config.enabled);
        self.dispatcher.refresh_display(&self.queue);
        outcome
    }

    async fn apply(&mut self, update: ConfigUpdate) {
        let ConfigUpdate { config, forced } = update;
        let changed = *self.active != config;
        let config = Arc::new(config);
        self.active = Arc::clone(&config);

        self.dispatcher
            .display_mut()
            .retarget(&config.text_source_name, &config.image_source_name);

        if !config.enabled {
            self.connection.stop().await;
            self.dispatcher.wait_idle(SPEECH_JOIN_TIMEOUT).await;
            self.reset_pipeline();
            self.dispatcher.display_mut().hide();
            info!("Chat speech disabled");
            return;
        }

        if !config.has_channel() {
            self.connection.stop().await;
            self.reset_pipeline();
            warn!("No channel configured; chat connection idle until one is set");
            return;
        }

        let restart = forced || changed || !self.connection.is_alive();
        if restart {
            self.connection.stop().await;
        }
        self.reset_pipeline();

        if restart {
            info!(channel = %config.channel, "Starting chat connection");
            let intake = ChatIntake::new(
                Arc::clone(&config),
                Arc::clone(&self.cooldowns),
                self.producer.clone(),
                Arc::clone(&self.stats),
            );
            self.connection.start(intake);
        }
    }

    /// Clear both cooldown maps (adopting the active windows) and drop
    /// anything queued under the previous configuration.
    fn reset_pipeline(&mut self) {
        self.cooldowns
            .lock()
            .reset(self.active.per_user_timeout, self.active.greet_timeout);
        let drained = self.queue.drain();
        if drained > 0 {
            debug!("Discarded {} queued message(s)", drained);
        }
    }

    /// Discard queued messages without touching anything else.
    pub fn drain(&mut self) -> usize {
        self.queue.drain()
    }

    pub fn status(&self) -> BridgeStatus {
        BridgeStatus {
            state: self.connection.state(),
            enabled: self.active.enabled,
            channel: self.active.channel.clone(),
            queue_len: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            speaking: self.dispatcher.is_speaking(),
            display_visible: self.dispatcher.display().is_visible(),
            config_pending: self.debouncer.is_pending(),
            stats: self.stats.snapshot(),
        }
    }

    /// Stop the connection, wait (bounded) for speech, hide the overlay.
    pub async fn shutdown(&mut self) {
        self.connection.stop().await;
        self.dispatcher.wait_idle(SPEECH_JOIN_TIMEOUT).await;
        self.queue.drain();
        self.dispatcher.display_mut().hide();
        info!("Chat bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::config::ChatSettings;
    use crate::display::LogDisplay;
    use crate::error::SynthesisError;
    use crate::queue::QueuedMessage;
    use crate::synth::SpeechRequest;

    struct SilentSynth;

    #[async_trait]
    impl Synthesizer for SilentSynth {
        async fn speak(&self, _request: &SpeechRequest) -> Result<(), SynthesisError> {
            Ok(())
        }
    }

    fn bridge() -> Bridge {
        let options = BridgeOptions {
            // nothing listens here; workers just back off
            endpoint: Endpoint {
                host: "127.0.0.1".to_string(),
                port: 1,
            },
            ..Default::default()
        };
        Bridge::new(options, Arc::new(SilentSynth), Arc::new(LogDisplay))
    }

    fn settings(enabled: bool, channel: &str) -> ChatConfig {
        ChatSettings {
            enabled,
            channel: channel.to_string(),
            ..Default::default()
        }
        .normalize()
    }

    fn queued() -> QueuedMessage {
        QueuedMessage {
            speak_text: "stale".to_string(),
            pitch: 30,
            display_text: "bob: stale".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_disabled_and_stopped() {
        let mut bridge = bridge();
        assert!(!bridge.is_enabled());
        assert_eq!(bridge.tick().await, DispatchOutcome::Disabled);
        assert_eq!(bridge.connection_state(), ConnectionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_is_forced() {
        let mut bridge = bridge();
        bridge.submit_config(settings(true, "chan"));
        assert!(bridge.status().config_pending);

        bridge.tick().await;
        assert!(bridge.is_enabled());
        assert_eq!(bridge.config().channel, "#chan");
        assert!(bridge.connection.is_alive());

        bridge.shutdown().await;
        assert_eq!(bridge.connection_state(), ConnectionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_are_debounced() {
        let mut bridge = bridge();
        bridge.submit_config(settings(false, "one"));
        bridge.tick().await;
        assert_eq!(bridge.config().channel, "#your_channel");

        tokio::time::advance(DEFAULT_DEBOUNCE).await;
        bridge.tick().await;
        assert_eq!(bridge.config().channel, "#one");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_channel_stays_idle() {
        let mut bridge = bridge();
        bridge.submit_config(settings(true, ""));
        bridge.tick().await;

        assert!(bridge.is_enabled());
        assert!(!bridge.connection.is_alive());
        assert_eq!(bridge.connection_state(), ConnectionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_drains_queue_and_clears_cooldowns() {
        let mut bridge = bridge();
        bridge.cooldowns.lock().trigger.record("alice");
        bridge.producer.try_enqueue(queued());
        assert_eq!(bridge.status().queue_len, 1);

        bridge.submit_config_with(settings(false, "chan"), true);
        bridge.tick().await;

        assert_eq!(bridge.status().queue_len, 0);
        assert!(bridge.cooldowns.lock().trigger.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain() {
        let mut bridge = bridge();
        bridge.producer.try_enqueue(queued());
        bridge.producer.try_enqueue(queued());
        assert_eq!(bridge.drain(), 2);
        assert_eq!(bridge.drain(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_serializes() {
        let bridge = bridge();
        let json = serde_json::to_value(bridge.status()).unwrap();
        assert_eq!(json["state"], "stopped");
        assert_eq!(json["enabled"], false);
        assert_eq!(json["queue_capacity"], 256);
        assert_eq!(json["stats"]["sessions"], 0);
    }
}
