//! Shared status surface for the session REPL.
//!
//! [`StatusFormatter`] renders anything implementing [`SequenceView`] into
//! the textual lines printed by the `status` command, so every host reports
//! the controller the same way.

use core::fmt;
use core::time::Duration;

use crate::controller::SequenceView;

/// Helper that renders a [`SequenceView`] into human-readable lines.
#[derive(Clone, Copy)]
pub struct StatusFormatter<'a, V: ?Sized> {
    view: &'a V,
}

impl<'a, V: SequenceView + ?Sized> StatusFormatter<'a, V> {
    #[must_use]
    pub const fn new(view: &'a V) -> Self {
        Self { view }
    }

    /// Writes the sequence line (e.g. `sequence state=in-progress pose=ARMS_UP index=1/4`).
    ///
    /// # Errors
    ///
    /// Propagates failures from `writer`.
    pub fn write_sequence_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.view.snapshot();
        write!(writer, "sequence state={}", snapshot.sequence_state)?;
        writer.write_str(" pose=")?;
        writer.write_str(self.view.current_pose().unwrap_or("none"))?;
        write!(
            writer,
            " index={}/{}",
            snapshot.pose_index,
            self.view.pose_count()
        )
    }

    /// Writes the hold line (e.g. `hold pose-state=holding held=0.4s min=1.0s progress=40%`).
    ///
    /// # Errors
    ///
    /// Propagates failures from `writer`.
    pub fn write_hold_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.view.snapshot();
        write!(writer, "hold pose-state={}", snapshot.pose_state)?;
        writer.write_str(" held=")?;
        write_duration(writer, snapshot.hold_time)?;
        writer.write_str(" min=")?;
        write_duration(writer, snapshot.minimum_hold_time)?;
        writer.write_str(" progress=")?;
        write_percent(writer, snapshot.hold_time, snapshot.minimum_hold_time)
    }
}

impl<V: ?Sized> fmt::Debug for StatusFormatter<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusFormatter").finish_non_exhaustive()
    }
}

fn write_duration<W: fmt::Write>(writer: &mut W, value: Duration) -> fmt::Result {
    if value >= Duration::from_secs(1) || value.is_zero() {
        let seconds = value.as_secs();
        let tenths = value.subsec_millis() / 100;
        write!(writer, "{seconds}.{tenths}s")
    } else if value >= Duration::from_millis(1) {
        write!(writer, "{}ms", value.subsec_millis())
    } else if value >= Duration::from_micros(1) {
        write!(writer, "{}us", value.subsec_micros())
    } else {
        write!(writer, "{}ns", value.subsec_nanos())
    }
}

fn write_percent<W: fmt::Write>(writer: &mut W, held: Duration, minimum: Duration) -> fmt::Result {
    if minimum.is_zero() {
        return writer.write_str("n/a");
    }
    let percent = held.as_nanos().saturating_mul(100) / minimum.as_nanos();
    write!(writer, "{percent}%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{BoundStep, SequenceMonitor, SequenceSnapshot, SequenceState};
    use crate::sequence::{PoseStep, SequenceConfig};
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;

    fn monitor(snapshot: SequenceSnapshot) -> SequenceMonitor {
        let steps: Rc<[BoundStep]> = ["TPOSE", "ARMS_UP"]
            .iter()
            .map(|pose| BoundStep::unbound(pose))
            .collect::<Vec<_>>()
            .into();
        SequenceMonitor::detached(steps, snapshot).0
    }

    #[test]
    fn renders_waiting_sequence() {
        let view = monitor(SequenceSnapshot::waiting(Duration::from_secs(1)));
        let formatter = StatusFormatter::new(&view);

        let mut line = String::new();
        formatter.write_sequence_line(&mut line).unwrap();
        assert_eq!(line, "sequence state=waiting pose=TPOSE index=0/2");

        line.clear();
        formatter.write_hold_line(&mut line).unwrap();
        assert_eq!(
            line,
            "hold pose-state=not-detected held=0.0s min=1.0s progress=0%"
        );
    }

    #[test]
    fn renders_partial_hold() {
        let mut snapshot = SequenceSnapshot::waiting(Duration::from_secs(1));
        snapshot.sequence_state = SequenceState::InProgress;
        snapshot.pose_index = 1;
        snapshot.hold_time = Duration::from_millis(450);
        let view = monitor(snapshot);
        let formatter = StatusFormatter::new(&view);

        let mut line = String::new();
        formatter.write_sequence_line(&mut line).unwrap();
        assert_eq!(line, "sequence state=in-progress pose=ARMS_UP index=1/2");

        line.clear();
        formatter.write_hold_line(&mut line).unwrap();
        assert!(line.ends_with("held=450ms min=1.0s progress=45%"), "{line}");
    }

    #[test]
    fn sub_millisecond_holds_keep_their_precision() {
        let minimum = Duration::from_nanos(500);
        let config = SequenceConfig::new(vec![PoseStep::silent("TPOSE")])
            .with_minimum_hold_time(minimum);
        assert_eq!(config.validate(), Ok(()));

        let mut snapshot = SequenceSnapshot::waiting(minimum);
        snapshot.sequence_state = SequenceState::InProgress;
        snapshot.hold_time = Duration::from_nanos(250);
        let view = monitor(snapshot);

        let mut line = String::new();
        StatusFormatter::new(&view)
            .write_hold_line(&mut line)
            .unwrap();
        assert!(line.ends_with("held=250ns min=500ns progress=50%"), "{line}");

        line.clear();
        write_duration(&mut line, Duration::from_micros(750)).unwrap();
        assert_eq!(line, "750us");
    }

    #[test]
    fn completed_sequence_has_no_current_pose() {
        let mut snapshot = SequenceSnapshot::waiting(Duration::from_secs(1));
        snapshot.sequence_state = SequenceState::Completed;
        snapshot.pose_index = 2;
        let view = monitor(snapshot);

        let mut line = String::new();
        StatusFormatter::new(&view)
            .write_sequence_line(&mut line)
            .unwrap();
        assert_eq!(line, "sequence state=completed pose=none index=2/2");
    }
}
