//! Session aggregation
//!
//! This module accumulates per-frame samples and feedback events over the
//! lifetime of a session and seals them into a `SessionMetrics` record for the
//! external persistence collaborator. The aggregator performs no I/O.

use chrono::Utc;
use uuid::Uuid;

use crate::types::{
    AlignmentState, FeedbackEvent, FeedbackKind, MetricSample, SessionMetrics, SessionSummary,
};
use crate::{ENGINE_VERSION, PRODUCER_NAME};

/// Schema version of the sealed session record
pub const METRICS_VERSION: &str = "1.0.0";

/// Accumulator for one session.
#[derive(Debug)]
pub struct SessionAggregator {
    session_id: String,
    samples: Vec<MetricSample>,
    events: Vec<FeedbackEvent>,
    frames_insufficient: u64,
}

impl Default for SessionAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            samples: Vec::new(),
            events: Vec::new(),
            frames_insufficient: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Record one processed frame.
    ///
    /// `scored` is false for frames that produced no numeric score.
    pub fn push_sample(&mut self, sample: MetricSample, scored: bool) {
        if !scored {
            self.frames_insufficient += 1;
        }
        self.samples.push(sample);
    }

    /// Record a feedback event.
    pub fn push_event(&mut self, event: FeedbackEvent) {
        self.events.push(event);
    }

    /// Seal the session and compute summary statistics.
    pub fn seal(self, template_name: &str) -> SessionMetrics {
        let now = Utc::now();
        let started_at = self.samples.first().map(|s| s.timestamp).unwrap_or(now);
        let ended_at = self.samples.last().map(|s| s.timestamp).unwrap_or(now);

        let summary = SessionSummary {
            mean_score: mean_score(&self.samples),
            median_score: median_score(&self.samples),
            total_aligned_sec: total_aligned_sec(&self.samples),
            aligned_entries: self
                .events
                .iter()
                .filter(|e| {
                    e.kind == FeedbackKind::StateChange && e.state == AlignmentState::Aligned
                })
                .count() as u32,
            holds_completed: self
                .events
                .iter()
                .filter(|e| e.kind == FeedbackKind::HoldCompleted)
                .count() as u32,
            frames_processed: self.samples.len() as u64,
            frames_insufficient: self.frames_insufficient,
        };

        SessionMetrics {
            metrics_version: METRICS_VERSION.to_string(),
            producer_name: PRODUCER_NAME.to_string(),
            producer_version: ENGINE_VERSION.to_string(),
            session_id: self.session_id,
            template_name: template_name.to_string(),
            started_at,
            ended_at,
            samples: self.samples,
            events: self.events,
            summary,
        }
    }
}

fn scored_values(samples: &[MetricSample]) -> Vec<f32> {
    samples.iter().filter_map(|s| s.smoothed_score).collect()
}

fn mean_score(samples: &[MetricSample]) -> Option<f32> {
    let values = scored_values(samples);
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f32>() / values.len() as f32)
}

fn median_score(samples: &[MetricSample]) -> Option<f32> {
    let mut values = scored_values(samples);
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Time spent in Aligned or Held, summed over sample intervals.
///
/// Each sample's state is attributed to the interval until the next sample;
/// the final sample contributes nothing (no known interval).
fn total_aligned_sec(samples: &[MetricSample]) -> f64 {
    samples
        .windows(2)
        .filter(|w| {
            matches!(
                w[0].state,
                AlignmentState::Aligned | AlignmentState::Held
            )
        })
        .map(|w| (w[1].timestamp - w[0].timestamp).num_milliseconds() as f64 / 1000.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::frame_time;

    fn sample(n: u64, score: Option<f32>, state: AlignmentState) -> MetricSample {
        MetricSample {
            timestamp: frame_time(n),
            smoothed_score: score,
            state,
        }
    }

    fn event(n: u64, kind: FeedbackKind, state: AlignmentState) -> FeedbackEvent {
        FeedbackEvent {
            timestamp: frame_time(n),
            kind,
            state,
            smoothed_score: Some(80.0),
            worst_offenders: Vec::new(),
        }
    }

    #[test]
    fn test_summary_statistics() {
        let mut agg = SessionAggregator::new();
        agg.push_sample(sample(0, Some(40.0), AlignmentState::Misaligned), true);
        agg.push_sample(sample(1, Some(80.0), AlignmentState::Aligning), true);
        agg.push_sample(sample(2, Some(90.0), AlignmentState::Aligned), true);
        agg.push_sample(sample(3, None, AlignmentState::Aligned), false);
        agg.push_event(event(2, FeedbackKind::StateChange, AlignmentState::Aligned));

        let metrics = agg.seal("squat");
        assert_eq!(metrics.template_name, "squat");
        assert_eq!(metrics.summary.frames_processed, 4);
        assert_eq!(metrics.summary.frames_insufficient, 1);
        assert_eq!(metrics.summary.aligned_entries, 1);
        assert_eq!(metrics.summary.holds_completed, 0);
        // mean of 40, 80, 90
        assert!((metrics.summary.mean_score.unwrap() - 70.0).abs() < 1e-4);
        assert!((metrics.summary.median_score.unwrap() - 80.0).abs() < 1e-4);
    }

    #[test]
    fn test_aligned_time_sums_intervals() {
        let mut agg = SessionAggregator::new();
        agg.push_sample(sample(0, Some(90.0), AlignmentState::Aligned), true);
        agg.push_sample(sample(1, Some(90.0), AlignmentState::Held), true);
        agg.push_sample(sample(2, Some(30.0), AlignmentState::Misaligned), true);
        agg.push_sample(sample(3, Some(30.0), AlignmentState::Misaligned), true);

        let metrics = agg.seal("plank");
        // Two 33ms intervals in Aligned/Held
        assert!((metrics.summary.total_aligned_sec - 0.066).abs() < 1e-6);
    }

    #[test]
    fn test_session_window_from_samples() {
        let mut agg = SessionAggregator::new();
        agg.push_sample(sample(5, Some(50.0), AlignmentState::Aligning), true);
        agg.push_sample(sample(9, Some(50.0), AlignmentState::Aligning), true);

        let metrics = agg.seal("squat");
        assert_eq!(metrics.started_at, frame_time(5));
        assert_eq!(metrics.ended_at, frame_time(9));
    }

    #[test]
    fn test_empty_session_seals_cleanly() {
        let metrics = SessionAggregator::new().seal("squat");
        assert_eq!(metrics.summary.frames_processed, 0);
        assert_eq!(metrics.summary.mean_score, None);
        assert_eq!(metrics.summary.median_score, None);
        assert_eq!(metrics.summary.total_aligned_sec, 0.0);
    }

    #[test]
    fn test_metrics_serialize_to_json() {
        let mut agg = SessionAggregator::new();
        agg.push_sample(sample(0, Some(75.0), AlignmentState::Aligning), true);
        let metrics = agg.seal("squat");

        let json = serde_json::to_string(&metrics).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["metrics_version"], METRICS_VERSION);
        assert_eq!(parsed["producer_name"], PRODUCER_NAME);
        assert_eq!(parsed["template_name"], "squat");
        assert!(parsed["session_id"].as_str().is_some());
    }

    #[test]
    fn test_unique_session_ids() {
        let a = SessionAggregator::new();
        let b = SessionAggregator::new();
        assert_ne!(a.session_id(), b.session_id());
    }
}
