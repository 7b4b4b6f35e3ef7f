//! Pose sequence configuration shared by every lens host.
//!
//! A sequence is an ordered list of [`PoseStep`] records. Each record carries
//! the pose identifier together with the names of the triggers fired when the
//! pose is detected, lost, and completed, so the correlation between a pose
//! and its triggers is structural rather than positional.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;

use thiserror::Error;

use crate::triggers::TriggerError;

pub mod riddle;

pub use riddle::{RIDDLE_POSES, riddle_sequence};

/// Default time a pose must be held continuously before it counts.
pub const DEFAULT_MINIMUM_HOLD_TIME: Duration = Duration::from_secs(1);
/// Default similarity threshold handed to the pose library.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.15;

pub const SEQUENCE_START: &str = "SEQUENCE_START";
pub const SEQUENCE_COMPLETE: &str = "SEQUENCE_COMPLETE";
pub const SEQUENCE_RESET: &str = "SEQUENCE_RESET";

pub const FULL_BODY_TRACKING_STARTED: &str = "FULL_BODY_TRACKING_STARTED";
pub const FULL_BODY_TRACKING_LOST: &str = "FULL_BODY_TRACKING_LOST";

/// One required pose and the triggers tied to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoseStep {
    pub pose: String,
    pub start_trigger: Option<String>,
    pub end_trigger: Option<String>,
    pub complete_trigger: Option<String>,
}

impl PoseStep {
    /// A step with no triggers attached.
    #[must_use]
    pub fn silent(pose: impl Into<String>) -> Self {
        Self {
            pose: pose.into(),
            start_trigger: None,
            end_trigger: None,
            complete_trigger: None,
        }
    }

    /// A step using the `{pose}_START`, `{pose}_END` and `{pose}_COMPLETE` names.
    #[must_use]
    pub fn with_default_triggers(pose: impl Into<String>) -> Self {
        let pose = pose.into();
        Self {
            start_trigger: Some(format!("{pose}_START")),
            end_trigger: Some(format!("{pose}_END")),
            complete_trigger: Some(format!("{pose}_COMPLETE")),
            pose,
        }
    }

    /// A step with explicit trigger names.
    #[must_use]
    pub fn new(
        pose: impl Into<String>,
        start_trigger: impl Into<String>,
        end_trigger: impl Into<String>,
        complete_trigger: impl Into<String>,
    ) -> Self {
        Self {
            pose: pose.into(),
            start_trigger: Some(start_trigger.into()),
            end_trigger: Some(end_trigger.into()),
            complete_trigger: Some(complete_trigger.into()),
        }
    }

    /// Iterates over the trigger names this step references.
    pub fn trigger_names(&self) -> impl Iterator<Item = &str> {
        [
            self.start_trigger.as_deref(),
            self.end_trigger.as_deref(),
            self.complete_trigger.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Trigger names for the whole-sequence lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleTriggers {
    pub sequence_start: String,
    pub sequence_complete: String,
    pub sequence_reset: String,
}

impl Default for LifecycleTriggers {
    fn default() -> Self {
        Self {
            sequence_start: SEQUENCE_START.into(),
            sequence_complete: SEQUENCE_COMPLETE.into(),
            sequence_reset: SEQUENCE_RESET.into(),
        }
    }
}

impl LifecycleTriggers {
    #[must_use]
    pub fn names(&self) -> [&str; 3] {
        [
            self.sequence_start.as_str(),
            self.sequence_complete.as_str(),
            self.sequence_reset.as_str(),
        ]
    }
}

/// Body-tracking triggers that drive the sequence lifecycle.
///
/// When configured, `started` queues a sequence start and `lost` queues a
/// reset; both are applied on the next frame update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackingTriggers {
    pub started: String,
    pub lost: String,
}

impl Default for TrackingTriggers {
    fn default() -> Self {
        Self {
            started: FULL_BODY_TRACKING_STARTED.into(),
            lost: FULL_BODY_TRACKING_LOST.into(),
        }
    }
}

/// What `start_sequence` does when a sequence is already running.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RestartPolicy {
    /// Restart from the first pose without publishing a reset.
    #[default]
    Restart,
    /// Refuse to start unless the sequence is waiting for start.
    RequireReset,
}

/// Immutable description of a pose sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceConfig {
    pub steps: Vec<PoseStep>,
    pub lifecycle: LifecycleTriggers,
    pub tracking_triggers: Option<TrackingTriggers>,
    pub minimum_hold_time: Duration,
    pub match_threshold: f32,
    pub restart_policy: RestartPolicy,
}

impl SequenceConfig {
    /// Builds a configuration with default timing and lifecycle triggers.
    #[must_use]
    pub fn new(steps: Vec<PoseStep>) -> Self {
        Self {
            steps,
            lifecycle: LifecycleTriggers::default(),
            tracking_triggers: None,
            minimum_hold_time: DEFAULT_MINIMUM_HOLD_TIME,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            restart_policy: RestartPolicy::default(),
        }
    }

    /// Builds steps from index-parallel pose and trigger lists.
    ///
    /// Trigger lists shorter than `poses` leave the trailing steps without
    /// that trigger.
    #[must_use]
    pub fn from_parallel<S: AsRef<str>>(
        poses: &[S],
        start_triggers: &[S],
        end_triggers: &[S],
        complete_triggers: &[S],
    ) -> Self {
        let pick = |names: &[S], index: usize| names.get(index).map(|name| name.as_ref().into());
        let steps = poses
            .iter()
            .enumerate()
            .map(|(index, pose)| PoseStep {
                pose: pose.as_ref().into(),
                start_trigger: pick(start_triggers, index),
                end_trigger: pick(end_triggers, index),
                complete_trigger: pick(complete_triggers, index),
            })
            .collect();
        Self::new(steps)
    }

    #[must_use]
    pub fn with_minimum_hold_time(mut self, hold: Duration) -> Self {
        self.minimum_hold_time = hold;
        self
    }

    #[must_use]
    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_lifecycle(mut self, lifecycle: LifecycleTriggers) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    #[must_use]
    pub fn with_tracking_triggers(mut self, triggers: TrackingTriggers) -> Self {
        self.tracking_triggers = Some(triggers);
        self
    }

    #[must_use]
    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Number of poses in the sequence.
    #[must_use]
    pub fn pose_count(&self) -> usize {
        self.steps.len()
    }

    /// Every trigger name the configuration references, in declaration order.
    pub fn trigger_names(&self) -> impl Iterator<Item = &str> {
        let tracking = self
            .tracking_triggers
            .iter()
            .flat_map(|triggers| [triggers.started.as_str(), triggers.lost.as_str()]);
        self.steps
            .iter()
            .flat_map(PoseStep::trigger_names)
            .chain(self.lifecycle.names())
            .chain(tracking)
    }

    /// Checks the structural invariants of the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: an empty sequence, an empty
    /// pose identifier or trigger name, a zero hold time, or a threshold
    /// outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::EmptySequence);
        }
        if let Some(index) = self.steps.iter().position(|step| step.pose.is_empty()) {
            return Err(ConfigError::EmptyPoseId { index });
        }
        if self.minimum_hold_time.is_zero() {
            return Err(ConfigError::InvalidHoldTime);
        }
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(ConfigError::InvalidThreshold(self.match_threshold));
        }
        if self.trigger_names().any(str::is_empty) {
            return Err(ConfigError::EmptyTriggerName);
        }
        Ok(())
    }
}

/// Configuration faults that disable the controller for the session.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    #[error("pose sequence is empty")]
    EmptySequence,
    #[error("pose identifier at index {index} is empty")]
    EmptyPoseId { index: usize },
    #[error("minimum hold time must be positive")]
    InvalidHoldTime,
    #[error("match threshold {0} is outside [0, 1]")]
    InvalidThreshold(f32),
    #[error("trigger names must not be empty")]
    EmptyTriggerName,
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error("could not load pose `{pose}` (index {index})")]
    UnresolvablePose { index: usize, pose: String },
}
