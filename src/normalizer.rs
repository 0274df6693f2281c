//! Pose normalization
//!
//! This module converts a raw landmark frame into the canonical body frame:
//! - Translation: origin moved to the hip midpoint
//! - Scale: coordinates divided by the shoulder-to-hip span
//! - Rotation (optional): shoulder line brought to the canonical horizontal
//!
//! Normalization is a pure function of its inputs; identical frames always
//! produce identical skeletons.

use thiserror::Error;

use crate::config::EngineConfig;
use crate::types::{JointId, LandmarkFrame, NormalizedJoint, NormalizedSkeleton};

/// Why a frame could not be normalized.
///
/// Not an error: an unscoreable frame degrades to a stale signal downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NormalizeFailure {
    /// One or more quorum joints fell below the confidence floor
    #[error("quorum joints below the confidence floor")]
    QuorumNotMet,
    /// The scale reference distance was below the configured minimum
    #[error("scale reference distance below the configured minimum")]
    DegenerateScale,
}

/// Normalizer turning landmark frames into canonical skeletons.
pub struct PoseNormalizer;

impl PoseNormalizer {
    /// Normalize one frame.
    pub fn normalize(
        frame: &LandmarkFrame,
        config: &EngineConfig,
    ) -> Result<NormalizedSkeleton, NormalizeFailure> {
        for joint in &config.quorum_joints {
            if !frame.get(*joint).is_confident(config.confidence_floor) {
                return Err(NormalizeFailure::QuorumNotMet);
            }
        }

        let hip_mid = midpoint(frame, JointId::LeftHip, JointId::RightHip);
        let shoulder_mid = midpoint(frame, JointId::LeftShoulder, JointId::RightShoulder);

        let scale = distance(shoulder_mid, hip_mid);
        if scale < config.min_scale {
            return Err(NormalizeFailure::DegenerateScale);
        }

        // In-plane rotation bringing the left-to-right shoulder vector onto +x.
        let (sin, cos) = if config.orientation_invariant {
            let ls = frame.get(JointId::LeftShoulder);
            let rs = frame.get(JointId::RightShoulder);
            let angle = (rs.y - ls.y).atan2(rs.x - ls.x);
            ((-angle).sin(), (-angle).cos())
        } else {
            (0.0, 1.0)
        };

        let joints = std::array::from_fn(|i| {
            let point = &frame.points[i];
            let tx = (point.x - hip_mid.0) / scale;
            let ty = (point.y - hip_mid.1) / scale;
            NormalizedJoint {
                x: tx * cos - ty * sin,
                y: tx * sin + ty * cos,
                confidence: point.confidence,
                below_floor: !point.is_confident(config.confidence_floor),
            }
        });

        Ok(NormalizedSkeleton {
            seq: frame.seq,
            timestamp: frame.timestamp,
            joints,
            scale,
        })
    }
}

fn midpoint(frame: &LandmarkFrame, a: JointId, b: JointId) -> (f32, f32) {
    let pa = frame.get(a);
    let pb = frame.get(b);
    ((pa.x + pb.x) / 2.0, (pa.y + pb.y) / 2.0)
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::make_test_frame;

    fn transform_frame(frame: &LandmarkFrame, dx: f32, dy: f32, s: f32, rot: f32) -> LandmarkFrame {
        let mut out = frame.clone();
        let (sin, cos) = rot.sin_cos();
        for p in &mut out.points {
            let x = p.x * cos - p.y * sin;
            let y = p.x * sin + p.y * cos;
            p.x = x * s + dx;
            p.y = y * s + dy;
        }
        out
    }

    fn skeleton_distance(a: &NormalizedSkeleton, b: &NormalizedSkeleton) -> f32 {
        a.joints
            .iter()
            .zip(b.joints.iter())
            .map(|(ja, jb)| ((ja.x - jb.x).powi(2) + (ja.y - jb.y).powi(2)).sqrt())
            .fold(0.0f32, f32::max)
    }

    #[test]
    fn test_centered_on_hip_midpoint() {
        let frame = make_test_frame(1);
        let skeleton = PoseNormalizer::normalize(&frame, &EngineConfig::default()).unwrap();
        let lh = skeleton.get(JointId::LeftHip);
        let rh = skeleton.get(JointId::RightHip);
        assert!((lh.x + rh.x).abs() < 1e-5);
        assert!((lh.y + rh.y).abs() < 1e-5);
    }

    #[test]
    fn test_unit_torso_length() {
        let frame = make_test_frame(1);
        let skeleton = PoseNormalizer::normalize(&frame, &EngineConfig::default()).unwrap();
        let ls = skeleton.get(JointId::LeftShoulder);
        let rs = skeleton.get(JointId::RightShoulder);
        let shoulder_mid = ((ls.x + rs.x) / 2.0, (ls.y + rs.y) / 2.0);
        let torso = (shoulder_mid.0.powi(2) + shoulder_mid.1.powi(2)).sqrt();
        assert!((torso - 1.0).abs() < 1e-5, "torso length {torso}");
    }

    #[test]
    fn test_invariance_under_translation_scale_rotation() {
        let config = EngineConfig::default();
        let frame = make_test_frame(1);
        let base = PoseNormalizer::normalize(&frame, &config).unwrap();

        for (dx, dy, s, rot) in [
            (150.0, -40.0, 1.0, 0.0),
            (0.0, 0.0, 2.5, 0.0),
            (0.0, 0.0, 1.0, 0.4),
            (-80.0, 200.0, 0.6, -0.9),
        ] {
            let moved = transform_frame(&frame, dx, dy, s, rot);
            let normalized = PoseNormalizer::normalize(&moved, &config).unwrap();
            let diff = skeleton_distance(&base, &normalized);
            assert!(
                diff < 1e-3,
                "not invariant under dx={dx} dy={dy} s={s} rot={rot}: diff={diff}"
            );
        }
    }

    #[test]
    fn test_rotation_not_removed_when_disabled() {
        let config = EngineConfig {
            orientation_invariant: false,
            ..Default::default()
        };
        let frame = make_test_frame(1);
        let base = PoseNormalizer::normalize(&frame, &config).unwrap();
        let rotated = transform_frame(&frame, 0.0, 0.0, 1.0, 0.5);
        let normalized = PoseNormalizer::normalize(&rotated, &config).unwrap();
        assert!(skeleton_distance(&base, &normalized) > 0.1);
    }

    #[test]
    fn test_deterministic() {
        let config = EngineConfig::default();
        let frame = make_test_frame(1);
        let a = PoseNormalizer::normalize(&frame, &config).unwrap();
        let b = PoseNormalizer::normalize(&frame, &config).unwrap();
        assert_eq!(skeleton_distance(&a, &b), 0.0);
        assert_eq!(a.scale, b.scale);
    }

    #[test]
    fn test_quorum_failure_on_low_hip_confidence() {
        let mut frame = make_test_frame(1);
        frame.points[JointId::LeftHip as usize].confidence = 0.2;
        frame.points[JointId::RightHip as usize].confidence = 0.1;
        let result = PoseNormalizer::normalize(&frame, &EngineConfig::default());
        assert_eq!(result.unwrap_err(), NormalizeFailure::QuorumNotMet);
    }

    #[test]
    fn test_degenerate_scale() {
        let mut frame = make_test_frame(1);
        // Collapse shoulders onto the hips
        frame.points[JointId::LeftShoulder as usize] =
            frame.points[JointId::LeftHip as usize];
        frame.points[JointId::RightShoulder as usize] =
            frame.points[JointId::RightHip as usize];
        let result = PoseNormalizer::normalize(&frame, &EngineConfig::default());
        assert_eq!(result.unwrap_err(), NormalizeFailure::DegenerateScale);
    }

    #[test]
    fn test_low_confidence_joints_flagged_not_dropped() {
        let mut frame = make_test_frame(1);
        frame.points[JointId::LeftWrist as usize].confidence = 0.1;
        let skeleton = PoseNormalizer::normalize(&frame, &EngineConfig::default()).unwrap();
        let wrist = skeleton.get(JointId::LeftWrist);
        assert!(wrist.below_floor);
        assert!((wrist.confidence - 0.1).abs() < 1e-6);
    }
}
