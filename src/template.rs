//! Pose templates
//!
//! A template is the comparison target for the scorer: reference joint
//! positions in the canonical body frame plus per-joint tolerance weights,
//! metric kinds, and ignore flags. Templates are validated at load time;
//! a bad template never reaches the scorer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{JointId, MetricKind, NormalizedSkeleton};

/// Per-joint comparison settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointTolerance {
    /// Reference X coordinate in body units
    pub x: f32,
    /// Reference Y coordinate in body units
    pub y: f32,
    /// Importance weight (0 disables the joint's contribution)
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Deviation metric evaluated for this joint
    #[serde(default = "default_metric")]
    pub metric: MetricKind,
    /// Exclude this joint from scoring entirely
    #[serde(default)]
    pub ignore: bool,
}

fn default_weight() -> f32 {
    1.0
}

fn default_metric() -> MetricKind {
    MetricKind::Positional
}

const IGNORED: JointTolerance = JointTolerance {
    x: 0.0,
    y: 0.0,
    weight: 0.0,
    metric: MetricKind::Positional,
    ignore: true,
};

/// A named reference pose.
#[derive(Debug, Clone)]
pub struct PoseTemplate {
    name: String,
    entries: [JointTolerance; JointId::COUNT],
}

/// On-disk template format: joints keyed by name so that unknown joints are
/// detectable (and rejected) at load time.
#[derive(Debug, Serialize, Deserialize)]
struct TemplateFile {
    name: String,
    joints: BTreeMap<String, JointTolerance>,
}

impl PoseTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, joint: JointId) -> &JointTolerance {
        &self.entries[joint as usize]
    }

    /// Joints that participate in scoring, in canonical order.
    pub fn active_joints(&self) -> impl Iterator<Item = JointId> + '_ {
        JointId::ALL
            .iter()
            .copied()
            .filter(move |j| !self.entries[*j as usize].ignore)
    }

    /// Capture a live skeleton as a template.
    ///
    /// Joints below the confidence floor are marked ignored; everything else
    /// gets unit weight and the positional metric.
    pub fn from_skeleton(name: &str, skeleton: &NormalizedSkeleton) -> Result<Self, EngineError> {
        let entries = std::array::from_fn(|i| {
            let joint = &skeleton.joints[i];
            if joint.below_floor {
                IGNORED
            } else {
                JointTolerance {
                    x: joint.x,
                    y: joint.y,
                    weight: 1.0,
                    metric: MetricKind::Positional,
                    ignore: false,
                }
            }
        });
        let template = Self {
            name: name.to_string(),
            entries,
        };
        template.validate()?;
        Ok(template)
    }

    /// Load and validate a template from JSON.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let file: TemplateFile = serde_json::from_str(json)?;
        let mut entries = [IGNORED; JointId::COUNT];
        for (name, tolerance) in &file.joints {
            let joint = JointId::from_name(name).ok_or_else(|| {
                EngineError::InvalidTemplate(format!("unknown joint '{name}'"))
            })?;
            entries[joint as usize] = *tolerance;
        }
        let template = Self {
            name: file.name,
            entries,
        };
        template.validate()?;
        Ok(template)
    }

    /// Serialize to the keyed JSON format (ignored joints omitted).
    pub fn to_json(&self) -> Result<String, EngineError> {
        let joints: BTreeMap<String, JointTolerance> = JointId::ALL
            .iter()
            .filter(|j| !self.entries[**j as usize].ignore)
            .map(|j| (j.as_str().to_string(), self.entries[*j as usize]))
            .collect();
        let file = TemplateFile {
            name: self.name.clone(),
            joints,
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Reject templates the scorer cannot evaluate.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut active = 0;
        for joint in JointId::ALL {
            let entry = &self.entries[joint as usize];
            if entry.ignore {
                continue;
            }
            active += 1;
            if !entry.weight.is_finite() || entry.weight < 0.0 {
                return Err(EngineError::InvalidTemplate(format!(
                    "joint '{}' has invalid weight {}",
                    joint.as_str(),
                    entry.weight
                )));
            }
            if !entry.x.is_finite() || !entry.y.is_finite() {
                return Err(EngineError::InvalidTemplate(format!(
                    "joint '{}' has non-finite coordinates",
                    joint.as_str()
                )));
            }
            if entry.metric == MetricKind::Angular {
                let parent = joint.parent().ok_or_else(|| {
                    EngineError::InvalidTemplate(format!(
                        "joint '{}' has no limb segment for the angular metric",
                        joint.as_str()
                    ))
                })?;
                if self.entries[parent as usize].ignore {
                    return Err(EngineError::InvalidTemplate(format!(
                        "angular metric on '{}' requires its parent '{}' in the template",
                        joint.as_str(),
                        parent.as_str()
                    )));
                }
            }
        }
        if active == 0 {
            return Err(EngineError::InvalidTemplate(
                "template ignores every joint".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for assembling templates in code.
pub struct TemplateBuilder {
    name: String,
    entries: [JointTolerance; JointId::COUNT],
}

impl TemplateBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: [IGNORED; JointId::COUNT],
        }
    }

    /// Set a joint's reference position (unit weight, positional metric).
    pub fn joint(mut self, joint: JointId, x: f32, y: f32) -> Self {
        self.entries[joint as usize] = JointTolerance {
            x,
            y,
            weight: 1.0,
            metric: MetricKind::Positional,
            ignore: false,
        };
        self
    }

    pub fn weight(mut self, joint: JointId, weight: f32) -> Self {
        self.entries[joint as usize].weight = weight;
        self
    }

    pub fn metric(mut self, joint: JointId, metric: MetricKind) -> Self {
        self.entries[joint as usize].metric = metric;
        self
    }

    pub fn ignore(mut self, joint: JointId) -> Self {
        self.entries[joint as usize] = IGNORED;
        self
    }

    pub fn build(self) -> Result<PoseTemplate, EngineError> {
        let template = PoseTemplate {
            name: self.name,
            entries: self.entries,
        };
        template.validate()?;
        Ok(template)
    }
}
