// Push channel abstraction shared by all transports
pub mod memory;
pub mod sse;
pub mod worker;

pub use memory::{MemoryFeed, MemoryOpener};
pub use sse::{SseOpener, SseParser};
pub use worker::WorkerOpener;

use crate::error::Result;
use crate::events::RawEvent;
use crate::models::StartParams;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    Event(RawEvent),
    /// The transport broke; carries the low-level reason for the logs
    Failed(String),
    /// The server ended the stream
    Closed,
}

/// Keeps a transport alive. Dropping the guard releases it: the producer sees
/// the closed flag and any task driving it is aborted.
pub struct ChannelGuard {
    closed: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl ChannelGuard {
    pub fn new(closed: Arc<AtomicBool>, task: Option<JoinHandle<()>>) -> Self {
        Self { closed, task }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// An open push channel: messages in arrival order plus the guard owning the transport
pub struct PushChannel {
    pub receiver: mpsc::Receiver<ChannelMessage>,
    pub guard: ChannelGuard,
}

impl PushChannel {
    pub fn new(receiver: mpsc::Receiver<ChannelMessage>, guard: ChannelGuard) -> Self {
        Self { receiver, guard }
    }

    pub fn into_parts(self) -> (mpsc::Receiver<ChannelMessage>, ChannelGuard) {
        (self.receiver, self.guard)
    }
}

/// Opens the push channel for one forecast job
pub trait ChannelOpener: Send + Sync {
    fn open(&self, params: &StartParams) -> Result<PushChannel>;
}
