//! Shared test fixtures.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::types::{JointId, LandmarkFrame, LandmarkPoint};

/// Fixed session start so fixtures are reproducible.
pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Timestamp `n` frames after `t0` at ~30 fps.
pub(crate) fn frame_time(n: u64) -> DateTime<Utc> {
    t0() + Duration::milliseconds((n as i64) * 33)
}

/// Upright figure in pixel coordinates, all joints at 0.9 confidence.
pub(crate) fn make_test_frame(seq: u64) -> LandmarkFrame {
    let mut points = [LandmarkPoint::new(0.0, 0.0, 0.9); JointId::COUNT];
    let mut set = |j: JointId, x: f32, y: f32| {
        points[j as usize] = LandmarkPoint::new(x, y, 0.9);
    };
    set(JointId::Nose, 320.0, 80.0);
    set(JointId::LeftEye, 310.0, 70.0);
    set(JointId::RightEye, 330.0, 70.0);
    set(JointId::LeftEar, 300.0, 75.0);
    set(JointId::RightEar, 340.0, 75.0);
    set(JointId::LeftShoulder, 260.0, 140.0);
    set(JointId::RightShoulder, 380.0, 140.0);
    set(JointId::LeftElbow, 220.0, 220.0);
    set(JointId::RightElbow, 420.0, 220.0);
    set(JointId::LeftWrist, 200.0, 300.0);
    set(JointId::RightWrist, 440.0, 300.0);
    set(JointId::LeftHip, 290.0, 330.0);
    set(JointId::RightHip, 350.0, 330.0);
    set(JointId::LeftKnee, 285.0, 450.0);
    set(JointId::RightKnee, 355.0, 450.0);
    set(JointId::LeftAnkle, 280.0, 570.0);
    set(JointId::RightAnkle, 360.0, 570.0);
    LandmarkFrame {
        seq,
        timestamp: frame_time(seq),
        source_frame_id: seq,
        points,
    }
}

/// Same figure with both hip confidences forced below any reasonable floor.
pub(crate) fn make_blind_frame(seq: u64) -> LandmarkFrame {
    let mut frame = make_test_frame(seq);
    frame.points[JointId::LeftHip as usize].confidence = 0.1;
    frame.points[JointId::RightHip as usize].confidence = 0.1;
    frame
}
