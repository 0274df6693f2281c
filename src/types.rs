//! Core types for the alignment pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: landmark frames, normalized skeletons, deviation reports, feedback
//! events, and session metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named joints of the fixed landmark vocabulary.
///
/// The vocabulary is the subset of the MediaPipe pose landmarks the alignment
/// rules actually consult. The declaration order is the canonical index order
/// and the deterministic tie-break order for worst-offender ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum JointId {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl JointId {
    pub const COUNT: usize = 17;

    /// All joints in canonical index order.
    pub const ALL: [JointId; JointId::COUNT] = [
        JointId::Nose,
        JointId::LeftEye,
        JointId::RightEye,
        JointId::LeftEar,
        JointId::RightEar,
        JointId::LeftShoulder,
        JointId::RightShoulder,
        JointId::LeftElbow,
        JointId::RightElbow,
        JointId::LeftWrist,
        JointId::RightWrist,
        JointId::LeftHip,
        JointId::RightHip,
        JointId::LeftKnee,
        JointId::RightKnee,
        JointId::LeftAnkle,
        JointId::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        JointId::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JointId::Nose => "nose",
            JointId::LeftEye => "left_eye",
            JointId::RightEye => "right_eye",
            JointId::LeftEar => "left_ear",
            JointId::RightEar => "right_ear",
            JointId::LeftShoulder => "left_shoulder",
            JointId::RightShoulder => "right_shoulder",
            JointId::LeftElbow => "left_elbow",
            JointId::RightElbow => "right_elbow",
            JointId::LeftWrist => "left_wrist",
            JointId::RightWrist => "right_wrist",
            JointId::LeftHip => "left_hip",
            JointId::RightHip => "right_hip",
            JointId::LeftKnee => "left_knee",
            JointId::RightKnee => "right_knee",
            JointId::LeftAnkle => "left_ankle",
            JointId::RightAnkle => "right_ankle",
        }
    }

    /// Parse a joint name as used in template files.
    pub fn from_name(name: &str) -> Option<Self> {
        JointId::ALL.iter().copied().find(|j| j.as_str() == name)
    }

    /// Proximal parent of the limb segment ending at this joint.
    ///
    /// Joints without a parent segment (head and torso anchors) only support
    /// the positional deviation metric.
    pub fn parent(&self) -> Option<JointId> {
        match self {
            JointId::LeftElbow => Some(JointId::LeftShoulder),
            JointId::RightElbow => Some(JointId::RightShoulder),
            JointId::LeftWrist => Some(JointId::LeftElbow),
            JointId::RightWrist => Some(JointId::RightElbow),
            JointId::LeftKnee => Some(JointId::LeftHip),
            JointId::RightKnee => Some(JointId::RightHip),
            JointId::LeftAnkle => Some(JointId::LeftKnee),
            JointId::RightAnkle => Some(JointId::RightKnee),
            _ => None,
        }
    }
}

/// A single detected landmark with position and confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    /// X coordinate (image- or camera-space units, producer-defined)
    pub x: f32,
    /// Y coordinate
    pub y: f32,
    /// Detection confidence (0-1)
    pub confidence: f32,
}

impl LandmarkPoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// Whether the detection confidence clears the given floor.
    pub fn is_confident(&self, floor: f32) -> bool {
        self.confidence >= floor
    }
}

impl Default for LandmarkPoint {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            confidence: 0.0,
        }
    }
}

/// One inference result: the full landmark vocabulary for a single camera frame.
///
/// Frames are produced by the external capture/inference collaborator and are
/// read-only once handed to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Monotonically increasing sequence number assigned by the producer
    pub seq: u64,
    /// Capture timestamp (UTC)
    pub timestamp: DateTime<Utc>,
    /// Identifier of the source camera frame
    pub source_frame_id: u64,
    /// Landmark points in canonical joint order
    pub points: [LandmarkPoint; JointId::COUNT],
}

impl LandmarkFrame {
    pub fn get(&self, joint: JointId) -> &LandmarkPoint {
        &self.points[joint as usize]
    }

    /// Mean confidence across the whole vocabulary.
    pub fn average_confidence(&self) -> f32 {
        let sum: f32 = self.points.iter().map(|p| p.confidence).sum();
        sum / JointId::COUNT as f32
    }
}

/// A joint in the canonical body frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedJoint {
    /// X coordinate in body units (origin at hip midpoint)
    pub x: f32,
    /// Y coordinate in body units
    pub y: f32,
    /// Detection confidence carried through from the source frame
    pub confidence: f32,
    /// Whether the confidence fell below the configured floor
    pub below_floor: bool,
}

/// Translation/scale/rotation-canonical skeleton representation.
///
/// Two skeletons differing only by the subject's distance from camera,
/// in-plane rotation, or translation normalize to near-identical joint
/// coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSkeleton {
    /// Sequence number of the source frame
    pub seq: u64,
    /// Capture timestamp of the source frame
    pub timestamp: DateTime<Utc>,
    /// Joints in canonical order, expressed in body units
    pub joints: [NormalizedJoint; JointId::COUNT],
    /// Body-size reference distance used as the scale divisor (source units)
    pub scale: f32,
}

impl NormalizedSkeleton {
    pub fn get(&self, joint: JointId) -> &NormalizedJoint {
        &self.joints[joint as usize]
    }
}

/// Deviation metric kind evaluated for a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Euclidean distance between live and template joint in body units
    Positional,
    /// Unsigned angle between the live and template limb segment
    Angular,
}

/// Per-joint deviation from the active template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointDeviation {
    pub joint: JointId,
    pub metric: MetricKind,
    /// Raw deviation (body units for positional, radians for angular)
    pub deviation: f32,
    /// Deviation normalized by the saturation threshold, clamped to [0,1]
    pub normalized: f32,
    /// Contribution weight (template weight x live confidence)
    pub weight: f32,
    /// Signed X offset from the template position (body units)
    pub dx: f32,
    /// Signed Y offset from the template position (body units)
    pub dy: f32,
}

/// Structured comparison of one skeleton against the active template.
///
/// Recomputed every frame; `score` is `None` when the frame could not be
/// normalized and no numeric judgment is possible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviationReport {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    /// Aggregate alignment score (0-100), or None for insufficient data
    pub score: Option<f32>,
    /// Per-joint deviations in canonical joint order (non-ignored joints only)
    pub joints: Vec<JointDeviation>,
    /// Worst-offending joints, highest weighted deviation first
    pub worst_offenders: Vec<JointId>,
}

impl DeviationReport {
    /// Whether the source frame carried enough confident data to score.
    pub fn is_insufficient(&self) -> bool {
        self.score.is_none()
    }
}

/// Discrete alignment judgment maintained by the temporal stabilizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentState {
    InsufficientData,
    Misaligned,
    Aligning,
    Aligned,
    Held,
}

/// Kind of feedback emitted on a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    /// Ordinary state transition
    StateChange,
    /// The configured hold duration completed (entering Held)
    HoldCompleted,
    /// Detection lost for longer than the stale limit
    TrackingLost,
}

/// One feedback event, emitted exactly once per state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: FeedbackKind,
    /// State entered by this transition
    pub state: AlignmentState,
    /// Smoothed score that triggered the transition, if any
    pub smoothed_score: Option<f32>,
    /// Worst-offending joints at the time of the transition
    pub worst_offenders: Vec<JointId>,
}

/// Per-frame sample recorded by the session aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub smoothed_score: Option<f32>,
    pub state: AlignmentState,
}

/// Summary statistics computed when a session is sealed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Mean smoothed score across scored samples
    pub mean_score: Option<f32>,
    /// Median smoothed score across scored samples
    pub median_score: Option<f32>,
    /// Total time spent in Aligned or Held (seconds)
    pub total_aligned_sec: f64,
    /// Number of times Aligned was entered
    pub aligned_entries: u32,
    /// Number of completed holds
    pub holds_completed: u32,
    /// Frames processed by the pipeline
    pub frames_processed: u64,
    /// Frames that could not be scored (insufficient data)
    pub frames_insufficient: u64,
}

/// Sealed session record handed to the external persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Schema version of this record
    pub metrics_version: String,
    /// Producer name and version for provenance
    pub producer_name: String,
    pub producer_version: String,
    /// Unique session identifier
    pub session_id: String,
    /// Name of the pose template active when the session was sealed
    pub template_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Per-frame samples in arrival order
    pub samples: Vec<MetricSample>,
    /// Feedback events in emission order
    pub events: Vec<FeedbackEvent>,
    pub summary: SessionSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_vocabulary_size() {
        assert_eq!(JointId::COUNT, 17);
        assert_eq!(JointId::ALL.len(), 17);
    }

    #[test]
    fn test_joint_index_round_trip() {
        for (i, joint) in JointId::ALL.iter().enumerate() {
            assert_eq!(*joint as usize, i);
            assert_eq!(JointId::from_index(i), Some(*joint));
        }
        assert_eq!(JointId::from_index(17), None);
    }

    #[test]
    fn test_joint_name_round_trip() {
        for joint in JointId::ALL {
            assert_eq!(JointId::from_name(joint.as_str()), Some(joint));
        }
        assert_eq!(JointId::from_name("left_pinky"), None);
    }

    #[test]
    fn test_segment_parents_are_proximal() {
        assert_eq!(JointId::LeftWrist.parent(), Some(JointId::LeftElbow));
        assert_eq!(JointId::RightAnkle.parent(), Some(JointId::RightKnee));
        assert_eq!(JointId::Nose.parent(), None);
        assert_eq!(JointId::LeftShoulder.parent(), None);
        assert_eq!(JointId::LeftHip.parent(), None);
    }

    #[test]
    fn test_landmark_confidence_floor() {
        let p = LandmarkPoint::new(0.5, 0.5, 0.7);
        assert!(p.is_confident(0.5));
        assert!(!p.is_confident(0.8));
    }

    #[test]
    fn test_frame_average_confidence() {
        let frame = LandmarkFrame {
            seq: 0,
            timestamp: Utc::now(),
            source_frame_id: 0,
            points: [LandmarkPoint::new(0.0, 0.0, 0.5); JointId::COUNT],
        };
        assert!((frame.average_confidence() - 0.5).abs() < 1e-6);
    }
}
