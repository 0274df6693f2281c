//! Engine configuration
//!
//! All tunables of the pipeline live here with documented defaults. A config
//! is validated once, at engine construction; invalid values fail fast and
//! never reach a running session.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::JointId;

/// Configuration for the alignment pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Confidence below this floor marks a joint as unreliable (0-1)
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f32,

    /// Joints that must clear the confidence floor for a frame to be scoreable
    #[serde(default = "default_quorum_joints")]
    pub quorum_joints: Vec<JointId>,

    /// Minimum shoulder-to-hip span (source units) accepted as a scale reference
    #[serde(default = "default_min_scale")]
    pub min_scale: f32,

    /// Rotate the skeleton so the shoulder line is canonical-horizontal
    #[serde(default = "default_orientation_invariant")]
    pub orientation_invariant: bool,

    /// Smoothed score at or below this leaves the aligned band (0-100)
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f32,

    /// Smoothed score at or above this enters the aligned band (0-100)
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f32,

    /// Consecutive frames at or above the high threshold required for Aligned
    #[serde(default = "default_dwell_frames")]
    pub dwell_frames: u32,

    /// Sustained time above the high threshold required for Held (seconds)
    #[serde(default = "default_hold_duration_sec")]
    pub hold_duration_sec: f32,

    /// Consecutive unscoreable frames tolerated before tracking counts as lost
    #[serde(default = "default_stale_limit")]
    pub stale_limit: u32,

    /// Exponential moving average decay factor, in (0,1]
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f32,

    /// Positional deviation (body units) at which a joint saturates to worst
    #[serde(default = "default_saturation_distance")]
    pub saturation_distance: f32,

    /// Angular deviation (degrees) at which a segment saturates to worst
    #[serde(default = "default_saturation_angle_deg")]
    pub saturation_angle_deg: f32,

    /// Number of worst-offending joints reported per frame
    #[serde(default = "default_worst_offender_count")]
    pub worst_offender_count: usize,

    /// Landmark frame queue capacity (drop-oldest beyond this)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_confidence_floor() -> f32 {
    0.5
}
fn default_quorum_joints() -> Vec<JointId> {
    vec![
        JointId::LeftShoulder,
        JointId::RightShoulder,
        JointId::LeftHip,
        JointId::RightHip,
    ]
}
fn default_min_scale() -> f32 {
    1e-3
}
fn default_orientation_invariant() -> bool {
    true
}
fn default_low_threshold() -> f32 {
    45.0
}
fn default_high_threshold() -> f32 {
    70.0
}
fn default_dwell_frames() -> u32 {
    5
}
fn default_hold_duration_sec() -> f32 {
    3.0
}
fn default_stale_limit() -> u32 {
    15
}
fn default_ema_alpha() -> f32 {
    0.3
}
fn default_saturation_distance() -> f32 {
    0.5
}
fn default_saturation_angle_deg() -> f32 {
    45.0
}
fn default_worst_offender_count() -> usize {
    3
}
fn default_queue_capacity() -> usize {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_floor: default_confidence_floor(),
            quorum_joints: default_quorum_joints(),
            min_scale: default_min_scale(),
            orientation_invariant: default_orientation_invariant(),
            low_threshold: default_low_threshold(),
            high_threshold: default_high_threshold(),
            dwell_frames: default_dwell_frames(),
            hold_duration_sec: default_hold_duration_sec(),
            stale_limit: default_stale_limit(),
            ema_alpha: default_ema_alpha(),
            saturation_distance: default_saturation_distance(),
            saturation_angle_deg: default_saturation_angle_deg(),
            worst_offender_count: default_worst_offender_count(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl EngineConfig {
    /// Validate all ranges. Called at engine construction.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(EngineError::InvalidConfig(format!(
                "confidence_floor must be in [0,1], got {}",
                self.confidence_floor
            )));
        }
        if self.quorum_joints.is_empty() {
            return Err(EngineError::InvalidConfig(
                "quorum_joints must not be empty".to_string(),
            ));
        }
        if !(self.min_scale > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "min_scale must be positive, got {}",
                self.min_scale
            )));
        }
        if !(0.0..=100.0).contains(&self.low_threshold)
            || !(0.0..=100.0).contains(&self.high_threshold)
        {
            return Err(EngineError::InvalidConfig(format!(
                "thresholds must be in [0,100], got low={} high={}",
                self.low_threshold, self.high_threshold
            )));
        }
        if self.low_threshold >= self.high_threshold {
            return Err(EngineError::InvalidConfig(format!(
                "low_threshold ({}) must be below high_threshold ({})",
                self.low_threshold, self.high_threshold
            )));
        }
        if self.dwell_frames == 0 {
            return Err(EngineError::InvalidConfig(
                "dwell_frames must be at least 1".to_string(),
            ));
        }
        if !(self.hold_duration_sec > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "hold_duration_sec must be positive, got {}",
                self.hold_duration_sec
            )));
        }
        if self.stale_limit == 0 {
            return Err(EngineError::InvalidConfig(
                "stale_limit must be at least 1".to_string(),
            ));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "ema_alpha must be in (0,1], got {}",
                self.ema_alpha
            )));
        }
        if !(self.saturation_distance > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "saturation_distance must be positive, got {}",
                self.saturation_distance
            )));
        }
        if !(self.saturation_angle_deg > 0.0 && self.saturation_angle_deg <= 180.0) {
            return Err(EngineError::InvalidConfig(format!(
                "saturation_angle_deg must be in (0,180], got {}",
                self.saturation_angle_deg
            )));
        }
        if self.worst_offender_count == 0 {
            return Err(EngineError::InvalidConfig(
                "worst_offender_count must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Angular saturation threshold in radians.
    pub fn saturation_angle_rad(&self) -> f32 {
        self.saturation_angle_deg.to_radians()
    }

    /// Load a configuration from JSON (absent fields take defaults).
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_thresholds_must_be_ordered() {
        let config = EngineConfig {
            low_threshold: 80.0,
            high_threshold: 70.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_ema_alpha_range() {
        for alpha in [0.0, -0.1, 1.5] {
            let config = EngineConfig {
                ema_alpha: alpha,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "alpha={alpha} should fail");
        }
        let config = EngineConfig {
            ema_alpha: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = EngineConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let config = EngineConfig::from_json(r#"{"low_threshold": 40.0}"#).unwrap();
        assert!((config.low_threshold - 40.0).abs() < 1e-6);
        assert!((config.high_threshold - 70.0).abs() < 1e-6);
        assert_eq!(config.quorum_joints.len(), 4);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        let result = EngineConfig::from_json(r#"{"ema_alpha": 0.0}"#);
        assert!(result.is_err());
    }
}
