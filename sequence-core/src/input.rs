//! Interfaces to the collaborators the lens host provides every frame.
//!
//! Pose recognition, body tracking and frame timing all live outside this
//! crate. The controller and the subscribers only see them through these
//! traits, so a lens runtime, the emulator and the tests can each plug in
//! their own implementation.

use alloc::vec::Vec;
use core::time::Duration;

/// Pose recognition backend.
///
/// `lookup_pose_frames` is called once per configured pose while the
/// controller binds; `matches_pose` is evaluated fresh every frame for the
/// active pose only.
pub trait PoseLibrary {
    /// Handle to a resolved pose (reference frames, skeleton template, ...).
    type Pose;

    /// Resolves pose identifiers into library handles.
    ///
    /// Identifiers the library does not know are omitted from the result, so
    /// an empty vector means the lookup failed.
    fn lookup_pose_frames(&self, ids: &[&str]) -> Vec<Self::Pose>;

    /// Returns `true` when the tracked body matches `pose` this frame.
    fn matches_pose(&mut self, pose: &Self::Pose, threshold: f32) -> bool;
}

/// Body-tracking presence, polled once per frame.
pub trait TrackingSignal {
    fn is_tracking(&self) -> bool;
}

impl TrackingSignal for bool {
    fn is_tracking(&self) -> bool {
        *self
    }
}

/// Elapsed time source for the current frame.
pub trait FrameClock {
    /// Time elapsed since the previous frame.
    fn delta_time(&self) -> Duration;
}

impl FrameClock for Duration {
    fn delta_time(&self) -> Duration {
        *self
    }
}

/// Converts a frame rate into a per-frame delta, clamping to at least 1 fps.
#[must_use]
pub fn frame_interval(frames_per_second: u32) -> Duration {
    let fps = frames_per_second.max(1);
    Duration::from_nanos(1_000_000_000 / u64::from(fps))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_interval_matches_common_rates() {
        assert_eq!(frame_interval(30), Duration::from_nanos(33_333_333));
        assert_eq!(frame_interval(1), Duration::from_secs(1));
        assert_eq!(frame_interval(0), Duration::from_secs(1));
    }

    #[test]
    fn primitive_signals_report_their_value() {
        assert!(true.is_tracking());
        assert!(!false.is_tracking());
        assert_eq!(
            Duration::from_millis(16).delta_time(),
            Duration::from_millis(16)
        );
    }
}
