//! Bounded utterance queue
//!
//! Many producers (the network worker, one per connection) feed a single
//! consumer (the dispatcher on the tick path). Producers never wait: a full
//! queue sheds the newest message.

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::warn;

/// Default number of pending utterances
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// One utterance waiting to be spoken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub speak_text: String,
    pub pitch: u32,
    pub display_text: String,
}

/// Create a connected producer/consumer pair.
pub fn message_queue(capacity: usize) -> (QueueProducer, MessageQueue) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    (QueueProducer { tx }, MessageQueue { rx, capacity })
}

/// Cloneable enqueue handle
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: mpsc::Sender<QueuedMessage>,
}

impl QueueProducer {
    /// Returns false (and logs) when the queue is full.
    pub fn try_enqueue(&self, message: QueuedMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!("Message queue full; dropping \"{}\"", dropped.display_text);
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Message queue closed; dropping message");
                false
            }
        }
    }
}

/// Consumer side, owned by the tick path
#[derive(Debug)]
pub struct MessageQueue {
    rx: mpsc::Receiver<QueuedMessage>,
    capacity: usize,
}

impl MessageQueue {
    pub fn try_dequeue(&mut self) -> Option<QueuedMessage> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Discard everything queued. Returns how many messages were dropped.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.try_dequeue().is_some() {
            drained += 1;
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
