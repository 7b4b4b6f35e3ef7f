use alloc::vec::Vec;

use super::{PoseStep, SequenceConfig};

/// Poses of the riddle lens, in order. `TPOSE` is struck twice.
pub const RIDDLE_POSES: [&str; 4] = ["TPOSE", "ARMS_UP", "THIRD_POSE_NO_ARMS", "TPOSE"];

const START_TRIGGERS: [&str; 4] = [
    "TPOSE_START",
    "ARMS_UP_START",
    "THIRD_POSE_NO_ARMS_START",
    "TPOSE_2_START",
];

const END_TRIGGERS: [&str; 4] = [
    "TPOSE_END",
    "ARMS_UP_END",
    "THIRD_POSE_NO_ARMS_END",
    "TPOSE_2_END",
];

const COMPLETE_TRIGGERS: [&str; 4] = [
    "TPOSE_COMPLETE",
    "ARMS_UP_COMPLETE",
    "THIRD_POSE_NO_ARMS_COMPLETE",
    "TPOSE_2_COMPLETE",
];

/// Default four-pose sequence shipped with the riddle lens.
///
/// The repeated `TPOSE` step carries its own `TPOSE_2_*` triggers so
/// subscribers can tell the two occurrences apart.
#[must_use]
pub fn riddle_sequence() -> SequenceConfig {
    let steps: Vec<PoseStep> = RIDDLE_POSES
        .iter()
        .zip(START_TRIGGERS)
        .zip(END_TRIGGERS)
        .zip(COMPLETE_TRIGGERS)
        .map(|(((pose, start), end), complete)| PoseStep::new(*pose, start, end, complete))
        .collect();
    SequenceConfig::new(steps)
}
