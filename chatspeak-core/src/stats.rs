//! Pipeline counters shared between the network worker and the tick path

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct PipelineStats {
    lines_received: AtomicU64,
    messages_queued: AtomicU64,
    messages_dropped: AtomicU64,
    utterances_started: AtomicU64,
    synthesis_failures: AtomicU64,
    connection_attempts: AtomicU64,
    sessions: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub lines_received: u64,
    pub messages_queued: u64,
    pub messages_dropped: u64,
    pub utterances_started: u64,
    pub synthesis_failures: u64,
    pub connection_attempts: u64,
    pub sessions: u64,
}

impl PipelineStats {
    pub fn line_received(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_queued(&self) {
        self.messages_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn utterance_started(&self) {
        self.utterances_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn synthesis_failed(&self) {
        self.synthesis_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_attempted(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_started(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines_received: self.lines_received.load(Ordering::Relaxed),
            messages_queued: self.messages_queued.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            utterances_started: self.utterances_started.load(Ordering::Relaxed),
            synthesis_failures: self.synthesis_failures.load(Ordering::Relaxed),
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
            sessions: self.sessions.load(Ordering::Relaxed),
        }
    }
}
