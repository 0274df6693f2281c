//! Alignment pipeline
//!
//! `AlignmentEngine` wires the stages together for one session:
//!
//! ```text
//! LandmarkFrame -> PoseNormalizer -> AlignmentScorer -> TemporalStabilizer
//!                                                     -> SessionAggregator
//! ```
//!
//! The engine is synchronous and single-threaded by construction; callers that
//! need a dedicated processing thread wrap it in a `SessionWorker`.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::normalizer::PoseNormalizer;
use crate::scorer::AlignmentScorer;
use crate::session::SessionAggregator;
use crate::source::LandmarkSource;
use crate::stabilizer::TemporalStabilizer;
use crate::template::PoseTemplate;
use crate::types::{
    AlignmentState, DeviationReport, FeedbackEvent, LandmarkFrame, MetricSample, SessionMetrics,
};

/// Everything one frame produced.
#[derive(Debug, Clone, Serialize)]
pub struct FrameOutcome {
    pub report: DeviationReport,
    /// State after this frame
    pub state: AlignmentState,
    /// Smoothed score after this frame
    pub smoothed_score: Option<f32>,
    /// Events emitted by this frame
    pub events: Vec<FeedbackEvent>,
}

/// One session's processing pipeline.
pub struct AlignmentEngine {
    config: EngineConfig,
    template: PoseTemplate,
    stabilizer: TemporalStabilizer,
    aggregator: SessionAggregator,
}

impl AlignmentEngine {
    /// Build an engine from a validated config and template.
    pub fn new(config: EngineConfig, template: PoseTemplate) -> Result<Self, EngineError> {
        config.validate()?;
        template.validate()?;
        let stabilizer = TemporalStabilizer::new(config.clone());
        Ok(Self {
            config,
            template,
            stabilizer,
            aggregator: SessionAggregator::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn template(&self) -> &PoseTemplate {
        &self.template
    }

    pub fn state(&self) -> AlignmentState {
        self.stabilizer.state()
    }

    pub fn session_id(&self) -> &str {
        self.aggregator.session_id()
    }

    /// Run one frame through normalize, score, stabilize, and aggregate.
    ///
    /// A frame that cannot be normalized still advances the stabilizer (as a
    /// stale frame) and is counted by the session aggregator.
    pub fn process_frame(&mut self, frame: &LandmarkFrame) -> FrameOutcome {
        let report = match PoseNormalizer::normalize(frame, &self.config) {
            Ok(skeleton) => AlignmentScorer::score(&skeleton, &self.template, &self.config),
            Err(_) => AlignmentScorer::insufficient(frame.seq, frame.timestamp),
        };

        let update = self.stabilizer.update(&report);
        self.aggregator.push_sample(
            MetricSample {
                timestamp: frame.timestamp,
                smoothed_score: update.smoothed_score,
                state: update.state,
            },
            !report.is_insufficient(),
        );
        for event in &update.events {
            self.aggregator.push_event(event.clone());
        }

        FrameOutcome {
            report,
            state: update.state,
            smoothed_score: update.smoothed_score,
            events: update.events,
        }
    }

    /// Capture the current frame's pose as a new template.
    ///
    /// The calibration flow: the user holds the pose they want to train
    /// against and the engine records it in the canonical body frame.
    pub fn capture_template(
        &self,
        name: &str,
        frame: &LandmarkFrame,
    ) -> Result<PoseTemplate, EngineError> {
        let skeleton = PoseNormalizer::normalize(frame, &self.config).map_err(|failure| {
            EngineError::InvalidTemplate(format!("cannot capture template: {failure}"))
        })?;
        PoseTemplate::from_skeleton(name, &skeleton)
    }

    /// Swap the active template mid-session.
    ///
    /// The stabilizer resets: smoothed scores and dwell progress against the
    /// old template say nothing about the new one.
    pub fn set_template(&mut self, template: PoseTemplate) -> Result<(), EngineError> {
        template.validate()?;
        self.template = template;
        self.stabilizer.reset();
        Ok(())
    }

    /// Seal the current session and start a fresh one.
    pub fn end_session(&mut self) -> SessionMetrics {
        let aggregator = std::mem::take(&mut self.aggregator);
        self.stabilizer.reset();
        aggregator.seal(self.template.name())
    }
}

/// Process a recorded frame sequence offline and return the sealed session.
pub fn replay_frames(
    frames: &[LandmarkFrame],
    template: PoseTemplate,
    config: EngineConfig,
) -> Result<SessionMetrics, EngineError> {
    let mut engine = AlignmentEngine::new(config, template)?;
    for frame in frames {
        engine.process_frame(frame);
    }
    Ok(engine.end_session())
}

/// Drain a landmark source through a fresh engine and return the sealed
/// session.
pub fn replay_source<S: LandmarkSource>(
    source: &mut S,
    template: PoseTemplate,
    config: EngineConfig,
) -> Result<SessionMetrics, EngineError> {
    let mut engine = AlignmentEngine::new(config, template)?;
    while let Some(frame) = source.next_frame() {
        engine.process_frame(&frame);
    }
    Ok(engine.end_session())
}
