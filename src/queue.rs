//! Landmark frame queue
//!
//! Bounded single-producer/single-consumer handoff between the external
//! capture/inference thread and the pipeline consumer:
//! - `push` never blocks the producer: a full queue evicts its oldest frame
//!   (freshness matters more than completeness for live feedback)
//! - Out-of-order arrivals are dropped, never reordered (late data is stale)
//! - Drops are counted and exposed as a health metric, not errors

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::LandmarkFrame;

/// Outcome of a producer push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Frame queued
    Queued,
    /// Frame queued; the oldest queued frame was evicted to make room
    DroppedOldest,
    /// Frame rejected: sequence number not newer than the last accepted
    RejectedOutOfOrder,
    /// Queue closed; frame discarded
    Closed,
}

/// Outcome of a consumer receive.
#[derive(Debug, Clone)]
pub enum RecvOutcome {
    Frame(LandmarkFrame),
    TimedOut,
    /// Producer closed and the queue is drained
    Closed,
}

/// Queue health counters, updated lock-free and readable from either side.
#[derive(Debug, Default)]
pub struct QueueStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    dropped_overflow: AtomicU64,
    dropped_out_of_order: AtomicU64,
}

/// Point-in-time copy of the queue health counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatsSnapshot {
    pub enqueued: u64,
    pub delivered: u64,
    pub dropped_overflow: u64,
    pub dropped_out_of_order: u64,
}

impl QueueStats {
    fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_overflow: self.dropped_overflow.load(Ordering::Relaxed),
            dropped_out_of_order: self.dropped_out_of_order.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct Inner {
    frames: VecDeque<LandmarkFrame>,
    last_seq: Option<u64>,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
    available: Condvar,
    capacity: usize,
    stats: QueueStats,
}

/// Bounded drop-oldest frame queue.
pub struct FrameQueue;

impl FrameQueue {
    /// Create a queue with the given capacity (at least 1).
    pub fn bounded(capacity: usize) -> (FrameProducer, FrameConsumer) {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity.max(1)),
                last_seq: None,
                closed: false,
            }),
            available: Condvar::new(),
            capacity: capacity.max(1),
            stats: QueueStats::default(),
        });
        (
            FrameProducer {
                shared: Arc::clone(&shared),
            },
            FrameConsumer { shared },
        )
    }
}

/// Producer half, held by the capture/inference collaborator.
pub struct FrameProducer {
    shared: Arc<Shared>,
}

impl FrameProducer {
    /// Offer a frame. Never blocks.
    pub fn push(&self, frame: LandmarkFrame) -> PushOutcome {
        let mut inner = match self.shared.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.closed {
            return PushOutcome::Closed;
        }
        if let Some(last) = inner.last_seq {
            if frame.seq <= last {
                self.shared
                    .stats
                    .dropped_out_of_order
                    .fetch_add(1, Ordering::Relaxed);
                return PushOutcome::RejectedOutOfOrder;
            }
        }
        inner.last_seq = Some(frame.seq);

        let mut outcome = PushOutcome::Queued;
        if inner.frames.len() == self.shared.capacity {
            inner.frames.pop_front();
            self.shared
                .stats
                .dropped_overflow
                .fetch_add(1, Ordering::Relaxed);
            outcome = PushOutcome::DroppedOldest;
        }
        inner.frames.push_back(frame);
        self.shared.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        drop(inner);
        self.shared.available.notify_one();
        outcome
    }

    /// Close the queue; the consumer drains what is queued and then ends.
    pub fn close(&self) {
        let mut inner = match self.shared.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.closed = true;
        drop(inner);
        self.shared.available.notify_one();
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl Drop for FrameProducer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consumer half, held by the pipeline thread.
pub struct FrameConsumer {
    shared: Arc<Shared>,
}

impl FrameConsumer {
    /// Wait up to `timeout` for the next frame.
    pub fn recv_timeout(&self, timeout: Duration) -> RecvOutcome {
        let mut inner = match self.shared.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        loop {
            if let Some(frame) = inner.frames.pop_front() {
                self.shared.stats.delivered.fetch_add(1, Ordering::Relaxed);
                return RecvOutcome::Frame(frame);
            }
            if inner.closed {
                return RecvOutcome::Closed;
            }
            let (guard, wait) = match self.shared.available.wait_timeout(inner, timeout) {
                Ok(result) => result,
                Err(poisoned) => {
                    let result = poisoned.into_inner();
                    (result.0, result.1)
                }
            };
            inner = guard;
            if wait.timed_out() {
                if let Some(frame) = inner.frames.pop_front() {
                    self.shared.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    return RecvOutcome::Frame(frame);
                }
                return if inner.closed {
                    RecvOutcome::Closed
                } else {
                    RecvOutcome::TimedOut
                };
            }
        }
    }

    /// Block until the next frame or the queue closes.
    pub fn recv(&self) -> Option<LandmarkFrame> {
        loop {
            match self.recv_timeout(Duration::from_millis(100)) {
                RecvOutcome::Frame(frame) => return Some(frame),
                RecvOutcome::TimedOut => continue,
                RecvOutcome::Closed => return None,
            }
        }
    }

    /// Discard everything queued and close. Used on session stop: no frame
    /// may be processed after the stop signal is observed.
    pub fn drain_and_close(&self) -> usize {
        let mut inner = match self.shared.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let discarded = inner.frames.len();
        inner.frames.clear();
        inner.closed = true;
        discarded
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        self.shared.stats.snapshot()
    }
}
