//! Temporal stabilization and the feedback state machine
//!
//! Raw per-frame scores jitter with detection noise. This module smooths them
//! with an exponential moving average and drives the alignment state machine:
//!
//! ```text
//! InsufficientData -> Misaligned | Aligning
//! Aligning  -> Aligned   (dwell: consecutive frames at/above high)
//! Aligned   -> Held      (sustained above high for the hold duration)
//! any state -> Misaligned        (smoothed drops below low)
//! any state -> InsufficientData  (stale limit exceeded, TrackingLost)
//! ```
//!
//! Entering Aligned uses the high threshold, leaving uses the low threshold
//! (hysteresis), so scores hovering at a boundary do not flicker.

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::types::{AlignmentState, DeviationReport, FeedbackEvent, FeedbackKind};

/// Result of feeding one report through the stabilizer.
#[derive(Debug, Clone)]
pub struct StabilizerUpdate {
    /// Smoothed score after this frame (None until the first scored frame)
    pub smoothed_score: Option<f32>,
    /// State after this frame
    pub state: AlignmentState,
    /// Events emitted by this frame (at most one transition per frame)
    pub events: Vec<FeedbackEvent>,
}

/// EMA smoother plus alignment state machine.
///
/// Owned by the single consumer pipeline; never shared across threads.
#[derive(Debug)]
pub struct TemporalStabilizer {
    config: EngineConfig,
    state: AlignmentState,
    smoothed: Option<f32>,
    /// Consecutive unscoreable frames
    stale_count: u32,
    /// Consecutive frames at/above the high threshold while Aligning
    dwell_count: u32,
    /// Start of the current at/above-high stretch while Aligned
    above_high_since: Option<DateTime<Utc>>,
}

impl TemporalStabilizer {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: AlignmentState::InsufficientData,
            smoothed: None,
            stale_count: 0,
            dwell_count: 0,
            above_high_since: None,
        }
    }

    pub fn state(&self) -> AlignmentState {
        self.state
    }

    pub fn smoothed_score(&self) -> Option<f32> {
        self.smoothed
    }

    /// Reset to the initial state, discarding the smoothed score.
    ///
    /// Called at session start and on template switch.
    pub fn reset(&mut self) {
        self.state = AlignmentState::InsufficientData;
        self.smoothed = None;
        self.stale_count = 0;
        self.dwell_count = 0;
        self.above_high_since = None;
    }

    /// Feed one deviation report through the smoother and state machine.
    pub fn update(&mut self, report: &DeviationReport) -> StabilizerUpdate {
        let mut events = Vec::new();

        let raw = match report.score {
            Some(raw) => raw,
            None => {
                self.stale_count += 1;
                if self.stale_count > self.config.stale_limit
                    && self.state != AlignmentState::InsufficientData
                {
                    // Prolonged loss of detection must not leave the user in a
                    // stale Aligned state, and must not read as "misaligned".
                    self.transition(
                        AlignmentState::InsufficientData,
                        FeedbackKind::TrackingLost,
                        report,
                        &mut events,
                    );
                    self.smoothed = None;
                }
                return StabilizerUpdate {
                    smoothed_score: self.smoothed,
                    state: self.state,
                    events,
                };
            }
        };

        self.stale_count = 0;
        let smoothed = match self.smoothed {
            Some(prev) => self.config.ema_alpha * raw + (1.0 - self.config.ema_alpha) * prev,
            None => raw,
        };
        self.smoothed = Some(smoothed);

        let low = self.config.low_threshold;
        let high = self.config.high_threshold;

        match self.state {
            AlignmentState::InsufficientData => {
                // Aligned is only reachable through the dwell in Aligning.
                if smoothed > low {
                    self.enter_aligning(smoothed >= high);
                    self.transition(
                        AlignmentState::Aligning,
                        FeedbackKind::StateChange,
                        report,
                        &mut events,
                    );
                } else {
                    self.transition(
                        AlignmentState::Misaligned,
                        FeedbackKind::StateChange,
                        report,
                        &mut events,
                    );
                }
            }
            AlignmentState::Misaligned => {
                if smoothed > low {
                    self.enter_aligning(smoothed >= high);
                    self.transition(
                        AlignmentState::Aligning,
                        FeedbackKind::StateChange,
                        report,
                        &mut events,
                    );
                }
            }
            AlignmentState::Aligning => {
                if smoothed <= low {
                    self.dwell_count = 0;
                    self.transition(
                        AlignmentState::Misaligned,
                        FeedbackKind::StateChange,
                        report,
                        &mut events,
                    );
                } else if smoothed >= high {
                    self.dwell_count += 1;
                    if self.dwell_count >= self.config.dwell_frames {
                        self.above_high_since = Some(report.timestamp);
                        self.transition(
                            AlignmentState::Aligned,
                            FeedbackKind::StateChange,
                            report,
                            &mut events,
                        );
                    }
                } else {
                    // Dwell requires consecutive frames at/above high
                    self.dwell_count = 0;
                }
            }
            AlignmentState::Aligned => {
                if smoothed < low {
                    self.above_high_since = None;
                    self.transition(
                        AlignmentState::Misaligned,
                        FeedbackKind::StateChange,
                        report,
                        &mut events,
                    );
                } else if smoothed >= high {
                    let since = *self.above_high_since.get_or_insert(report.timestamp);
                    let held_for =
                        (report.timestamp - since).num_milliseconds() as f32 / 1000.0;
                    if held_for >= self.config.hold_duration_sec {
                        self.transition(
                            AlignmentState::Held,
                            FeedbackKind::HoldCompleted,
                            report,
                            &mut events,
                        );
                    }
                } else {
                    // Dip below high (but above low): stay Aligned, hold clock
                    // restarts when the score recovers
                    self.above_high_since = None;
                }
            }
            AlignmentState::Held => {
                if smoothed < low {
                    self.above_high_since = None;
                    self.transition(
                        AlignmentState::Misaligned,
                        FeedbackKind::StateChange,
                        report,
                        &mut events,
                    );
                }
            }
        }

        StabilizerUpdate {
            smoothed_score: self.smoothed,
            state: self.state,
            events,
        }
    }

    fn enter_aligning(&mut self, crossed_high: bool) {
        self.dwell_count = if crossed_high { 1 } else { 0 };
        self.above_high_since = None;
    }

    fn transition(
        &mut self,
        next: AlignmentState,
        kind: FeedbackKind,
        report: &DeviationReport,
        events: &mut Vec<FeedbackEvent>,
    ) {
        self.state = next;
        events.push(FeedbackEvent {
            timestamp: report.timestamp,
            kind,
            state: next,
            smoothed_score: self.smoothed,
            worst_offenders: report.worst_offenders.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::frame_time;

    fn make_config() -> EngineConfig {
        EngineConfig {
            ema_alpha: 1.0, // raw == smoothed for deterministic threshold tests
            dwell_frames: 3,
            hold_duration_sec: 0.1,
            stale_limit: 2,
            ..Default::default()
        }
    }

    fn scored(seq: u64, score: f32) -> DeviationReport {
        DeviationReport {
            seq,
            timestamp: frame_time(seq),
            score: Some(score),
            joints: Vec::new(),
            worst_offenders: Vec::new(),
        }
    }

    fn unscored(seq: u64) -> DeviationReport {
        DeviationReport {
            seq,
            timestamp: frame_time(seq),
            score: None,
            joints: Vec::new(),
            worst_offenders: Vec::new(),
        }
    }

    /// Feed a run of scored frames, returning all events.
    fn feed(
        stabilizer: &mut TemporalStabilizer,
        start_seq: u64,
        scores: &[f32],
    ) -> Vec<FeedbackEvent> {
        let mut events = Vec::new();
        for (i, s) in scores.iter().enumerate() {
            let update = stabilizer.update(&scored(start_seq + i as u64, *s));
            events.extend(update.events);
        }
        events
    }

    #[test]
    fn test_initial_state() {
        let stabilizer = TemporalStabilizer::new(make_config());
        assert_eq!(stabilizer.state(), AlignmentState::InsufficientData);
        assert_eq!(stabilizer.smoothed_score(), None);
    }

    #[test]
    fn test_first_scored_frame_classifies() {
        let mut s = TemporalStabilizer::new(make_config());
        let update = s.update(&scored(0, 20.0));
        assert_eq!(update.state, AlignmentState::Misaligned);
        assert_eq!(update.events.len(), 1);
        assert_eq!(update.events[0].state, AlignmentState::Misaligned);

        let mut s = TemporalStabilizer::new(make_config());
        let update = s.update(&scored(0, 60.0));
        assert_eq!(update.state, AlignmentState::Aligning);
    }

    #[test]
    fn test_single_good_frame_does_not_align() {
        let mut s = TemporalStabilizer::new(make_config());
        feed(&mut s, 0, &[20.0, 95.0]);
        // One frame above high: Aligning, not Aligned
        assert_eq!(s.state(), AlignmentState::Aligning);
    }

    #[test]
    fn test_dwell_promotes_to_aligned() {
        let mut s = TemporalStabilizer::new(make_config());
        let events = feed(&mut s, 0, &[20.0, 95.0, 95.0, 95.0]);
        assert_eq!(s.state(), AlignmentState::Aligned);
        let aligned: Vec<_> = events
            .iter()
            .filter(|e| e.state == AlignmentState::Aligned)
            .collect();
        assert_eq!(aligned.len(), 1);
    }

    #[test]
    fn test_dwell_requires_consecutive_frames() {
        let mut s = TemporalStabilizer::new(make_config());
        // Dip below high mid-dwell resets the counter
        feed(&mut s, 0, &[20.0, 95.0, 95.0, 60.0, 95.0, 95.0]);
        assert_eq!(s.state(), AlignmentState::Aligning);
        feed(&mut s, 6, &[95.0]);
        assert_eq!(s.state(), AlignmentState::Aligned);
    }

    #[test]
    fn test_hysteresis_dip_above_low_stays_aligned() {
        let mut s = TemporalStabilizer::new(make_config());
        feed(&mut s, 0, &[95.0, 95.0, 95.0]);
        assert_eq!(s.state(), AlignmentState::Aligned);

        // Dip between low (45) and high (70): no exit
        feed(&mut s, 3, &[60.0, 55.0]);
        assert_eq!(s.state(), AlignmentState::Aligned);

        // Dip below low: exit
        feed(&mut s, 5, &[30.0]);
        assert_eq!(s.state(), AlignmentState::Misaligned);
    }

    #[test]
    fn test_hold_completion_emits_exactly_once() {
        let mut s = TemporalStabilizer::new(make_config());
        // 0.1s hold at ~33ms per frame: a few frames above high suffice
        let events = feed(&mut s, 0, &[95.0, 95.0, 95.0, 95.0, 95.0, 95.0, 95.0, 95.0]);
        assert_eq!(s.state(), AlignmentState::Held);
        let holds: Vec<_> = events
            .iter()
            .filter(|e| e.kind == FeedbackKind::HoldCompleted)
            .collect();
        assert_eq!(holds.len(), 1);
    }

    #[test]
    fn test_hold_clock_restarts_after_dip_below_high() {
        let mut s = TemporalStabilizer::new(make_config());
        feed(&mut s, 0, &[95.0, 95.0, 95.0]);
        assert_eq!(s.state(), AlignmentState::Aligned);

        // Dip below high just before the hold would complete
        feed(&mut s, 3, &[60.0]);
        assert_eq!(s.state(), AlignmentState::Aligned);

        // Two frames (66ms) above high: not yet 100ms since recovery
        feed(&mut s, 4, &[95.0, 95.0]);
        assert_eq!(s.state(), AlignmentState::Aligned);

        // Past 100ms since recovery: hold completes
        let events = feed(&mut s, 6, &[95.0, 95.0, 95.0]);
        assert_eq!(s.state(), AlignmentState::Held);
        assert!(events.iter().any(|e| e.kind == FeedbackKind::HoldCompleted));
    }

    #[test]
    fn test_stale_limit_forces_tracking_lost() {
        let mut s = TemporalStabilizer::new(make_config());
        feed(&mut s, 0, &[95.0, 95.0, 95.0]);
        assert_eq!(s.state(), AlignmentState::Aligned);

        // stale_limit = 2: two unscoreable frames tolerated, third is lost
        let mut events = Vec::new();
        for seq in 3..6 {
            events.extend(s.update(&unscored(seq)).events);
        }
        assert_eq!(s.state(), AlignmentState::InsufficientData);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FeedbackKind::TrackingLost);
        // Smoothed score is discarded with the lost track
        assert_eq!(s.smoothed_score(), None);
    }

    #[test]
    fn test_brief_staleness_does_not_move_the_score() {
        let mut s = TemporalStabilizer::new(make_config());
        feed(&mut s, 0, &[80.0]);
        let before = s.smoothed_score();
        s.update(&unscored(1));
        assert_eq!(s.smoothed_score(), before);
        // A scored frame resets the stale counter
        feed(&mut s, 2, &[80.0]);
        s.update(&unscored(3));
        s.update(&unscored(4));
        assert_ne!(s.state(), AlignmentState::InsufficientData);
    }

    #[test]
    fn test_ema_smooths_jitter() {
        let config = EngineConfig {
            ema_alpha: 0.3,
            ..make_config()
        };
        let mut s = TemporalStabilizer::new(config);
        s.update(&scored(0, 80.0));
        let update = s.update(&scored(1, 20.0));
        // 0.3 * 20 + 0.7 * 80 = 62
        assert!((update.smoothed_score.unwrap() - 62.0).abs() < 1e-4);
    }

    #[test]
    fn test_reset_discards_smoothed_score() {
        let mut s = TemporalStabilizer::new(make_config());
        feed(&mut s, 0, &[95.0, 95.0, 95.0]);
        assert_eq!(s.state(), AlignmentState::Aligned);

        s.reset();
        assert_eq!(s.state(), AlignmentState::InsufficientData);
        assert_eq!(s.smoothed_score(), None);

        // After reset the dwell applies afresh
        feed(&mut s, 3, &[95.0]);
        assert_eq!(s.state(), AlignmentState::Aligning);
    }

    #[test]
    fn test_exactly_one_event_per_transition() {
        let mut s = TemporalStabilizer::new(make_config());
        let events = feed(&mut s, 0, &[20.0, 20.0, 95.0, 95.0, 95.0, 20.0, 20.0]);
        // Misaligned, Aligning, Aligned, Misaligned: four transitions
        assert_eq!(events.len(), 4);
        assert_eq!(
            events.iter().map(|e| e.state).collect::<Vec<_>>(),
            vec![
                AlignmentState::Misaligned,
                AlignmentState::Aligning,
                AlignmentState::Aligned,
                AlignmentState::Misaligned,
            ]
        );
    }
}
