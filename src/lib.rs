//! Alignify Core - On-device pose-alignment engine for real-time posture feedback
//!
//! The engine turns a stream of body landmark frames into alignment scores,
//! feedback events, and session metrics through a deterministic pipeline:
//! frame ingestion → pose normalization → alignment scoring → temporal
//! stabilization → session aggregation.
//!
//! ## Modules
//!
//! - **Pipeline**: Per-frame processing against a pose template (`AlignmentEngine`)
//! - **Worker**: Dedicated session thread fed by a bounded frame queue
//! - **Templates**: Reference poses loaded from JSON or captured live

pub mod config;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod queue;
pub mod scorer;
pub mod session;
pub mod source;
pub mod stabilizer;
pub mod template;
pub mod types;
pub mod worker;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::EngineConfig;
pub use error::EngineError;
pub use pipeline::{replay_frames, replay_source, AlignmentEngine, FrameOutcome};
pub use queue::{
    FrameConsumer, FrameProducer, FrameQueue, PushOutcome, QueueStatsSnapshot, RecvOutcome,
};
pub use session::METRICS_VERSION;
pub use source::{LandmarkSource, RecordedSource, ScriptedSource};
pub use template::{PoseTemplate, TemplateBuilder};
pub use types::{
    AlignmentState, DeviationReport, FeedbackEvent, FeedbackKind, JointId, LandmarkFrame,
    LandmarkPoint, SessionMetrics,
};
pub use worker::{SealedSession, SessionHandle, SessionWorker};

/// Engine version embedded in all session metrics payloads
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for session metrics payloads
pub const PRODUCER_NAME: &str = "alignify-core";
