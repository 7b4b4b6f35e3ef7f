//! Cosmetic components driven by the pose sequence.
//!
//! Subscribers never touch the controller. They register handlers on the
//! trigger bus when attached, poll a [`SequenceMonitor`] where they need the
//! current pose or hold progress, and render through the traits in
//! [`scene`]. Each one keeps its local model behind `Rc<RefCell<_>>`, shared
//! between the handlers and the per-frame [`FrameSubscriber::update`].

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::controller::{SequenceMonitor, SequenceView};
use crate::input::FrameClock;
use crate::sequence::LifecycleTriggers;
use crate::triggers::{Trigger, TriggerBus, TriggerError};

pub mod effects;
pub mod final_reveal;
pub mod progress_image;
pub mod riddle_image;
pub mod scene;
pub mod ui;

pub use effects::{CompletionEffect, EffectGroup, EffectSettings, SequenceEffects};
pub use final_reveal::{FinalPoseReveal, FinalRevealSettings};
pub use progress_image::{ProgressImage, ProgressImageSettings};
pub use riddle_image::{RiddleImage, RiddlePanel, RiddleSettings, RiddleStage};
pub use scene::{EffectTarget, ImageTarget, Rgba, SequenceUiTarget, TextTarget};
pub use ui::{SequenceUi, UiSettings};

/// Per-frame hook shared by every subscriber.
pub trait FrameSubscriber {
    fn update(&self, clock: &dyn FrameClock);
}

/// Lifecycle triggers resolved against a bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LifecycleSet {
    pub sequence_start: Trigger,
    pub sequence_complete: Trigger,
    pub sequence_reset: Trigger,
}

/// Everything a subscriber needs to attach: the bus, a monitor and the
/// lifecycle trigger handles.
#[derive(Clone, Debug)]
pub struct SubscriberContext {
    pub bus: Rc<TriggerBus>,
    pub monitor: SequenceMonitor,
    pub lifecycle: LifecycleSet,
}

impl SubscriberContext {
    /// Resolves the lifecycle trigger names against `bus`.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Unknown`] when a lifecycle name is missing from
    /// the bus catalog.
    pub fn new(
        bus: Rc<TriggerBus>,
        monitor: SequenceMonitor,
        lifecycle: &LifecycleTriggers,
    ) -> Result<Self, TriggerError> {
        let lifecycle = LifecycleSet {
            sequence_start: bus.resolve(&lifecycle.sequence_start)?,
            sequence_complete: bus.resolve(&lifecycle.sequence_complete)?,
            sequence_reset: bus.resolve(&lifecycle.sequence_reset)?,
        };
        Ok(Self {
            bus,
            monitor,
            lifecycle,
        })
    }

    /// Every pose trigger of the monitored sequence, without duplicates.
    #[must_use]
    pub fn pose_triggers(&self) -> Vec<Trigger> {
        let mut triggers: Vec<Trigger> = Vec::new();
        for step in self.monitor.steps() {
            for trigger in [step.start, step.end, step.complete].into_iter().flatten() {
                if !triggers.contains(&trigger) {
                    triggers.push(trigger);
                }
            }
        }
        triggers
    }

    /// Resolves a list of trigger names.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Unknown`] for the first unknown name.
    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Trigger>, TriggerError> {
        names
            .iter()
            .map(|name| self.bus.resolve(name.as_ref()))
            .collect()
    }
}

pub(crate) fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| String::from(*name)).collect()
}
