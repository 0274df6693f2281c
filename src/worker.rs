//! Session worker thread
//!
//! `SessionWorker` owns an `AlignmentEngine` on a dedicated thread and feeds
//! it from a `FrameConsumer`. Feedback events stream out over a channel as
//! they happen; the sealed session (metrics plus final queue counters) comes
//! back when the worker stops.
//!
//! Stopping is cooperative: the handle raises a flag, the worker observes it
//! between frames, discards anything still queued, and seals the session. No
//! frame is processed after the stop signal is observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use crate::error::EngineError;
use crate::pipeline::AlignmentEngine;
use crate::queue::{FrameConsumer, QueueStatsSnapshot, RecvOutcome};
use crate::types::{FeedbackEvent, SessionMetrics};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sealed result of a stopped session worker.
#[derive(Debug)]
pub struct SealedSession {
    pub metrics: SessionMetrics,
    /// Queue health at the moment the worker stopped
    pub queue_stats: QueueStatsSnapshot,
}

/// Handle to a running session worker.
pub struct SessionHandle {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<SealedSession>,
}

impl SessionHandle {
    /// Signal the worker to stop and wait for the sealed session.
    pub fn stop(self) -> Result<SealedSession, EngineError> {
        self.stop.store(true, Ordering::Release);
        self.handle
            .join()
            .map_err(|_| EngineError::Worker("session worker thread panicked".to_string()))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Dedicated processing thread for one session.
pub struct SessionWorker;

impl SessionWorker {
    /// Start a worker consuming `consumer` into `engine`.
    ///
    /// Returns the control handle and the live feedback event stream. The
    /// worker ends when the handle stops it or the producer closes the queue.
    pub fn spawn(
        mut engine: AlignmentEngine,
        consumer: FrameConsumer,
    ) -> (SessionHandle, mpsc::Receiver<FeedbackEvent>) {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let (event_tx, event_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            loop {
                if stop_flag.load(Ordering::Acquire) {
                    consumer.drain_and_close();
                    break;
                }
                match consumer.recv_timeout(POLL_INTERVAL) {
                    RecvOutcome::Frame(frame) => {
                        let outcome = engine.process_frame(&frame);
                        for event in outcome.events {
                            // The subscriber may have hung up; feedback is
                            // advisory and the session continues without it.
                            let _ = event_tx.send(event);
                        }
                    }
                    RecvOutcome::TimedOut => continue,
                    RecvOutcome::Closed => break,
                }
            }
            SealedSession {
                metrics: engine.end_session(),
                queue_stats: consumer.stats(),
            }
        });

        (SessionHandle { stop, handle }, event_rx)
    }
}
