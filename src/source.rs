//! Landmark sources
//!
//! The engine never talks to a camera or a pose model directly; it consumes
//! frames from anything implementing `LandmarkSource`. Production integrations
//! adapt their inference callback to this trait; tests and offline tooling use
//! `ScriptedSource`.

use chrono::{DateTime, Duration, Utc};

use crate::types::{JointId, LandmarkFrame, LandmarkPoint};

/// A pull-based stream of landmark frames.
pub trait LandmarkSource {
    /// Next frame, or None when the stream ends.
    fn next_frame(&mut self) -> Option<LandmarkFrame>;
}

/// Deterministic source replaying a fixed list of poses at a fixed frame rate.
///
/// Each pose is a full set of joint positions with a uniform confidence.
/// Sequence numbers and timestamps are assigned on the way out.
pub struct ScriptedSource {
    poses: Vec<[LandmarkPoint; JointId::COUNT]>,
    start: DateTime<Utc>,
    frame_interval_ms: i64,
    next_seq: u64,
}

impl ScriptedSource {
    pub fn new(
        poses: Vec<[LandmarkPoint; JointId::COUNT]>,
        start: DateTime<Utc>,
        frame_interval_ms: i64,
    ) -> Self {
        Self {
            poses,
            start,
            frame_interval_ms,
            next_seq: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.poses.len().saturating_sub(self.next_seq as usize)
    }
}

impl LandmarkSource for ScriptedSource {
    fn next_frame(&mut self) -> Option<LandmarkFrame> {
        let points = *self.poses.get(self.next_seq as usize)?;
        let seq = self.next_seq;
        self.next_seq += 1;
        Some(LandmarkFrame {
            seq,
            timestamp: self.start + Duration::milliseconds(seq as i64 * self.frame_interval_ms),
            source_frame_id: seq,
            points,
        })
    }
}

/// Source yielding previously captured frames unchanged (seq and timestamps
/// included).
pub struct RecordedSource {
    frames: std::vec::IntoIter<LandmarkFrame>,
}

impl RecordedSource {
    pub fn new(frames: Vec<LandmarkFrame>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl LandmarkSource for RecordedSource {
    fn next_frame(&mut self) -> Option<LandmarkFrame> {
        self.frames.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{make_test_frame, t0};

    #[test]
    fn test_scripted_source_assigns_seq_and_timestamps() {
        let pose = make_test_frame(0).points;
        let mut source = ScriptedSource::new(vec![pose, pose, pose], t0(), 33);

        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert_eq!(
            (second.timestamp - first.timestamp).num_milliseconds(),
            33
        );
        assert_eq!(source.remaining(), 1);

        source.next_frame().unwrap();
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_recorded_source_preserves_frames() {
        let frames = vec![make_test_frame(7), make_test_frame(9)];
        let mut source = RecordedSource::new(frames);

        assert_eq!(source.next_frame().unwrap().seq, 7);
        assert_eq!(source.next_frame().unwrap().seq, 9);
        assert!(source.next_frame().is_none());
    }
}
