//! Number revealed once the whole sequence is done.

use alloc::string::String;
use core::cell::{Cell, Ref, RefCell};

use tracing::debug;

use super::scene::TextTarget;
use super::{FrameSubscriber, SubscriberContext};
use crate::controller::{SequenceMonitor, SequenceState, SequenceView};
use crate::input::FrameClock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalRevealSettings {
    pub number: String,
}

impl Default for FinalRevealSettings {
    fn default() -> Self {
        Self { number: "5".into() }
    }
}

/// Shows the configured number while the sequence is complete.
///
/// Polls the monitor every frame; the text is hidden again once the
/// sequence is back to waiting for start.
pub struct FinalPoseReveal<T> {
    monitor: SequenceMonitor,
    number: String,
    shown: Cell<bool>,
    target: RefCell<T>,
}

impl<T: TextTarget> FinalPoseReveal<T> {
    /// Hides the text target and starts polling `context.monitor`.
    #[must_use]
    pub fn attach(
        context: &SubscriberContext,
        settings: FinalRevealSettings,
        mut target: T,
    ) -> Self {
        target.set_enabled(false);
        Self {
            monitor: context.monitor.clone(),
            number: settings.number,
            shown: Cell::new(false),
            target: RefCell::new(target),
        }
    }

    #[must_use]
    pub fn is_shown(&self) -> bool {
        self.shown.get()
    }

    #[must_use]
    pub fn target(&self) -> Ref<'_, T> {
        self.target.borrow()
    }
}

impl<T: TextTarget> FrameSubscriber for FinalPoseReveal<T> {
    fn update(&self, _clock: &dyn FrameClock) {
        let shown = self.shown.get();
        if !shown && self.monitor.is_sequence_complete() {
            debug!(number = self.number.as_str(), "revealing final number");
            let mut target = self.target.borrow_mut();
            target.set_text(&self.number);
            target.set_enabled(true);
            self.shown.set(true);
        } else if shown && self.monitor.sequence_state() == SequenceState::WaitingForStart {
            debug!("hiding final number");
            self.target.borrow_mut().set_enabled(false);
            self.shown.set(false);
        }
    }
}
