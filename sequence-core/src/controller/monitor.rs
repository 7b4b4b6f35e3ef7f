use alloc::rc::Rc;
use alloc::string::String;
use core::cell::Cell;
use core::time::Duration;

use super::state::{PoseState, SequenceSnapshot, SequenceState};
use crate::triggers::Trigger;

/// Configured pose with its triggers resolved against the bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundStep {
    pub pose: String,
    pub start: Option<Trigger>,
    pub end: Option<Trigger>,
    pub complete: Option<Trigger>,
}

impl BoundStep {
    /// Step with no triggers, used when the controller failed to bind.
    #[must_use]
    pub fn unbound(pose: &str) -> Self {
        Self {
            pose: pose.into(),
            start: None,
            end: None,
            complete: None,
        }
    }
}

/// Read-only query surface of a pose sequence.
pub trait SequenceView {
    /// Latest runtime snapshot.
    fn snapshot(&self) -> SequenceSnapshot;

    /// Configured steps, in order.
    fn steps(&self) -> &[BoundStep];

    fn sequence_state(&self) -> SequenceState {
        self.snapshot().sequence_state
    }

    fn pose_state(&self) -> PoseState {
        self.snapshot().pose_state
    }

    fn pose_index(&self) -> usize {
        self.snapshot().pose_index
    }

    fn pose_count(&self) -> usize {
        self.steps().len()
    }

    fn hold_time(&self) -> Duration {
        self.snapshot().hold_time
    }

    fn minimum_hold_time(&self) -> Duration {
        self.snapshot().minimum_hold_time
    }

    /// Identifier of the active pose, or `None` once every pose is done.
    fn current_pose(&self) -> Option<&str> {
        self.steps()
            .get(self.pose_index())
            .map(|step| step.pose.as_str())
    }

    /// Hold time over minimum hold time for the active pose. Not clamped.
    fn current_pose_progress(&self) -> f32 {
        self.snapshot().progress()
    }

    fn is_sequence_complete(&self) -> bool {
        self.sequence_state() == SequenceState::Completed
    }
}

/// Cheap handle for polling a controller without borrowing it.
///
/// The controller refreshes the shared board before every trigger it
/// publishes and at the end of every frame update, so handlers running
/// inside a publication observe the state that caused it.
#[derive(Clone, Debug)]
pub struct SequenceMonitor {
    steps: Rc<[BoundStep]>,
    board: Rc<Cell<SequenceSnapshot>>,
}

impl SequenceMonitor {
    pub(crate) fn new(steps: Rc<[BoundStep]>, board: Rc<Cell<SequenceSnapshot>>) -> Self {
        Self { steps, board }
    }

    /// Monitor over a fixed snapshot, for hosts and tests that drive
    /// subscribers without a controller.
    #[must_use]
    pub fn detached(
        steps: Rc<[BoundStep]>,
        snapshot: SequenceSnapshot,
    ) -> (Self, Rc<Cell<SequenceSnapshot>>) {
        let board = Rc::new(Cell::new(snapshot));
        (Self::new(steps, Rc::clone(&board)), board)
    }
}

impl SequenceView for SequenceMonitor {
    fn snapshot(&self) -> SequenceSnapshot {
        self.board.get()
    }

    fn steps(&self) -> &[BoundStep] {
        &self.steps
    }
}
