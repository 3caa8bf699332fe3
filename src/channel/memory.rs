// In-process transport fed directly by the caller
use super::{ChannelGuard, ChannelMessage, ChannelOpener, PushChannel, CHANNEL_CAPACITY};
use crate::error::{ForecastError, Result};
use crate::events::RawEvent;
use crate::models::StartParams;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sending side of one in-memory channel
#[derive(Clone)]
pub struct MemoryFeed {
    params: StartParams,
    tx: mpsc::Sender<ChannelMessage>,
    closed: Arc<AtomicBool>,
}

impl MemoryFeed {
    pub fn params(&self) -> StartParams {
        self.params
    }

    /// Returns false once the receiving job has released the channel
    pub fn send_event(&self, kind: &str, data: &str) -> bool {
        self.send(ChannelMessage::Event(RawEvent::new(kind, data)))
    }

    pub fn fail(&self, reason: &str) -> bool {
        self.send(ChannelMessage::Failed(reason.to_string()))
    }

    pub fn close(&self) -> bool {
        self.send(ChannelMessage::Closed)
    }

    pub fn is_released(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn send(&self, message: ChannelMessage) -> bool {
        !self.is_released() && self.tx.try_send(message).is_ok()
    }
}

/// Hands out in-memory channels and keeps every feed so the caller can drive them
#[derive(Default)]
pub struct MemoryOpener {
    feeds: Mutex<Vec<MemoryFeed>>,
    refuse: AtomicBool,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `open` calls fail as an unreachable server would
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn opened_count(&self) -> usize {
        self.feeds.lock().len()
    }

    pub fn feed(&self, index: usize) -> Option<MemoryFeed> {
        self.feeds.lock().get(index).cloned()
    }

    pub fn latest(&self) -> Option<MemoryFeed> {
        self.feeds.lock().last().cloned()
    }

    pub fn open_feeds(&self) -> usize {
        self.feeds.lock().iter().filter(|f| !f.is_released()).count()
    }
}

impl ChannelOpener for MemoryOpener {
    fn open(&self, params: &StartParams) -> Result<PushChannel> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ForecastError::Transport("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));
        self.feeds.lock().push(MemoryFeed {
            params: *params,
            tx,
            closed: closed.clone(),
        });

        Ok(PushChannel::new(rx, ChannelGuard::new(closed, None)))
    }
}
