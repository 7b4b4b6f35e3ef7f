use core::fmt;
use core::time::Duration;

/// Lifecycle of the whole pose sequence.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SequenceState {
    #[default]
    WaitingForStart,
    InProgress,
    Completed,
}

impl SequenceState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SequenceState::WaitingForStart => "waiting",
            SequenceState::InProgress => "in-progress",
            SequenceState::Completed => "completed",
        }
    }

    /// Returns `true` while frame updates evaluate poses.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, SequenceState::InProgress)
    }
}

impl fmt::Display for SequenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detection sub-state of the active pose.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PoseState {
    #[default]
    NotDetected,
    Detected,
    Holding,
    Completed,
}

impl PoseState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PoseState::NotDetected => "not-detected",
            PoseState::Detected => "detected",
            PoseState::Holding => "holding",
            PoseState::Completed => "completed",
        }
    }
}

impl fmt::Display for PoseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Copy of the controller runtime published to the status board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequenceSnapshot {
    pub sequence_state: SequenceState,
    pub pose_state: PoseState,
    pub pose_index: usize,
    pub hold_time: Duration,
    pub minimum_hold_time: Duration,
}

impl SequenceSnapshot {
    /// Snapshot of a sequence that has not started.
    #[must_use]
    pub const fn waiting(minimum_hold_time: Duration) -> Self {
        Self {
            sequence_state: SequenceState::WaitingForStart,
            pose_state: PoseState::NotDetected,
            pose_index: 0,
            hold_time: Duration::ZERO,
            minimum_hold_time,
        }
    }

    /// Hold time as a fraction of the minimum hold time. Not clamped.
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.minimum_hold_time.is_zero() {
            return 0.0;
        }
        self.hold_time.as_secs_f32() / self.minimum_hold_time.as_secs_f32()
    }

    /// Time left before the active pose counts, saturating at zero.
    #[must_use]
    pub fn remaining_hold(&self) -> Duration {
        self.minimum_hold_time.saturating_sub(self.hold_time)
    }
}

/// Mutable state owned by the controller.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct SequenceRuntime {
    pub(crate) sequence_state: SequenceState,
    pub(crate) pose_index: usize,
    pub(crate) pose_state: PoseState,
    pub(crate) hold_time: Duration,
}

impl SequenceRuntime {
    /// Back to the first pose in the given lifecycle state.
    pub(crate) fn rewind(&mut self, state: SequenceState) {
        *self = Self {
            sequence_state: state,
            ..Self::default()
        };
    }

    /// Clears the active pose without moving the index.
    pub(crate) fn release_pose(&mut self) {
        self.pose_state = PoseState::NotDetected;
        self.hold_time = Duration::ZERO;
    }

    pub(crate) const fn snapshot(&self, minimum_hold_time: Duration) -> SequenceSnapshot {
        SequenceSnapshot {
            sequence_state: self.sequence_state,
            pose_state: self.pose_state,
            pose_index: self.pose_index,
            hold_time: self.hold_time,
            minimum_hold_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_a_ratio_of_the_minimum_hold() {
        let mut snapshot = SequenceSnapshot::waiting(Duration::from_secs(2));
        snapshot.hold_time = Duration::from_millis(500);
        assert!((snapshot.progress() - 0.25).abs() < 1e-6);
        assert_eq!(snapshot.remaining_hold(), Duration::from_millis(1500));

        snapshot.hold_time = Duration::from_secs(3);
        assert!(snapshot.progress() > 1.0);
        assert_eq!(snapshot.remaining_hold(), Duration::ZERO);
    }

    #[test]
    fn zero_minimum_hold_reports_no_progress() {
        let snapshot = SequenceSnapshot::waiting(Duration::ZERO);
        assert!(snapshot.progress().abs() < f32::EPSILON);
    }

    #[test]
    fn rewind_clears_pose_bookkeeping() {
        let mut runtime = SequenceRuntime {
            sequence_state: SequenceState::InProgress,
            pose_index: 2,
            pose_state: PoseState::Holding,
            hold_time: Duration::from_millis(400),
        };
        runtime.rewind(SequenceState::WaitingForStart);
        assert_eq!(runtime, SequenceRuntime::default());
    }
}
