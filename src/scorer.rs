//! Alignment scoring
//!
//! This module compares a normalized skeleton against the active pose template
//! and produces a deviation report:
//! - Per-joint positional or angular deviation, normalized by its saturation
//!   threshold and clamped (deviations never drive the score unboundedly)
//! - Aggregate score 0-100: weighted mean of normalized deviations, inverted
//! - Worst-offender ranking with vocabulary-order tie break

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::template::PoseTemplate;
use crate::types::{
    DeviationReport, JointDeviation, MetricKind, NormalizedSkeleton,
};

/// Scorer comparing skeletons against templates.
pub struct AlignmentScorer;

impl AlignmentScorer {
    /// Score one skeleton against the template.
    pub fn score(
        skeleton: &NormalizedSkeleton,
        template: &PoseTemplate,
        config: &EngineConfig,
    ) -> DeviationReport {
        let mut joints = Vec::new();
        let mut weighted_sum = 0.0f32;
        let mut weight_total = 0.0f32;

        for joint in template.active_joints() {
            let tolerance = template.get(joint);
            let live = skeleton.get(joint);
            let dx = live.x - tolerance.x;
            let dy = live.y - tolerance.y;

            let (deviation, normalized) = match tolerance.metric {
                MetricKind::Positional => {
                    let dist = (dx * dx + dy * dy).sqrt();
                    (dist, (dist / config.saturation_distance).clamp(0.0, 1.0))
                }
                MetricKind::Angular => {
                    // Template validation guarantees the parent is present.
                    let parent = match joint.parent() {
                        Some(p) => p,
                        None => continue,
                    };
                    let live_parent = skeleton.get(parent);
                    let template_parent = template.get(parent);
                    let angle = segment_angle(
                        (live.x - live_parent.x, live.y - live_parent.y),
                        (
                            tolerance.x - template_parent.x,
                            tolerance.y - template_parent.y,
                        ),
                    );
                    (
                        angle,
                        (angle / config.saturation_angle_rad()).clamp(0.0, 1.0),
                    )
                }
            };

            let weight = tolerance.weight * live.confidence;
            weighted_sum += weight * normalized;
            weight_total += weight;

            joints.push(JointDeviation {
                joint,
                metric: tolerance.metric,
                deviation,
                normalized,
                weight,
                dx,
                dy,
            });
        }

        let score = if weight_total > 0.0 {
            let aggregate = weighted_sum / weight_total;
            Some(((1.0 - aggregate) * 100.0).clamp(0.0, 100.0))
        } else {
            None
        };

        let worst_offenders = rank_worst(&joints, config.worst_offender_count);

        DeviationReport {
            seq: skeleton.seq,
            timestamp: skeleton.timestamp,
            score,
            joints,
            worst_offenders,
        }
    }

    /// Short-circuit report for a frame that failed normalization.
    pub fn insufficient(seq: u64, timestamp: DateTime<Utc>) -> DeviationReport {
        DeviationReport {
            seq,
            timestamp,
            score: None,
            joints: Vec::new(),
            worst_offenders: Vec::new(),
        }
    }
}

/// Unsigned angle between two segment vectors, in radians.
///
/// A degenerate segment (near-zero length) cannot carry direction and
/// contributes no angular deviation.
fn segment_angle(a: (f32, f32), b: (f32, f32)) -> f32 {
    const EPS: f32 = 1e-6;
    let len_a = (a.0 * a.0 + a.1 * a.1).sqrt();
    let len_b = (b.0 * b.0 + b.1 * b.1).sqrt();
    if len_a < EPS || len_b < EPS {
        return 0.0;
    }
    let dot = a.0 * b.0 + a.1 * b.1;
    let cross = a.0 * b.1 - a.1 * b.0;
    cross.atan2(dot).abs()
}

/// Top-N joints by weighted normalized deviation, ties broken by joint order.
fn rank_worst(joints: &[JointDeviation], count: usize) -> Vec<crate::types::JointId> {
    let mut offenders: Vec<&JointDeviation> =
        joints.iter().filter(|d| d.normalized > 0.0).collect();
    offenders.sort_by(|a, b| {
        let wa = a.weight * a.normalized;
        let wb = b.weight * b.normalized;
        wb.partial_cmp(&wa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (a.joint as usize).cmp(&(b.joint as usize)))
    });
    offenders.into_iter().take(count).map(|d| d.joint).collect()
}
