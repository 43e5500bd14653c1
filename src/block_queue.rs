//! Block ingestion queue.
//!
//! Serializes block-height notifications for the single consumer loop.
//! Heights drain in ascending order, so processing is FIFO by height even
//! when the upstream subscription delivers out of order. The queue is
//! bounded: when full, the oldest height that has not yet started processing
//! is evicted. An in-flight block is never in the queue, so it can never be
//! evicted.

use std::collections::BTreeSet;
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::{debug, warn};

pub struct BlockQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

struct QueueState {
    heights: BTreeSet<u64>,
    closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// The height was already queued.
    Duplicate,
    /// Enqueued, but the returned oldest unstarted height was dropped to
    /// make room.
    Evicted(u64),
    /// The queue no longer accepts new heights.
    Closed,
}

impl BlockQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                heights: BTreeSet::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enqueues a block height, evicting the oldest unstarted entry when the
    /// queue is full.
    pub fn push(&self, height: u64) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock().expect("block queue lock poisoned");
            if state.closed {
                return PushOutcome::Closed;
            }
            if !state.heights.insert(height) {
                return PushOutcome::Duplicate;
            }
            if state.heights.len() > self.capacity {
                // Lowest height arrived earliest; it is the oldest entry that
                // has not started processing.
                let dropped = state
                    .heights
                    .pop_first()
                    .expect("non-empty queue has a first entry");
                PushOutcome::Evicted(dropped)
            } else {
                PushOutcome::Enqueued
            }
        };

        match outcome {
            PushOutcome::Evicted(dropped) if dropped == height => {
                // The new height itself was the oldest; nothing to wake up for.
                warn!(height, "block dropped due to backpressure");
            }
            PushOutcome::Evicted(dropped) => {
                warn!(height = dropped, "block dropped due to backpressure");
                self.notify.notify_one();
            }
            PushOutcome::Enqueued => {
                debug!(height, "block enqueued");
                self.notify.notify_one();
            }
            _ => {}
        }
        outcome
    }

    /// Waits for the next height to process, lowest first. After `close()`
    /// the remaining heights still drain; `None` means closed and empty.
    /// Callers that must stop immediately watch the shutdown flag instead of
    /// waiting for the drain.
    pub async fn pop(&self) -> Option<u64> {
        loop {
            {
                let mut state = self.state.lock().expect("block queue lock poisoned");
                if let Some(height) = state.heights.pop_first() {
                    return Some(height);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Stops accepting new heights and wakes the consumer so it can observe
    /// the close once the queue runs dry.
    pub fn close(&self) {
        self.state.lock().expect("block queue lock poisoned").closed = true;
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("block queue lock poisoned").heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
