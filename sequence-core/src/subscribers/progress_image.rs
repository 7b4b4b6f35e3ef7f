//! Image that counts completed poses.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell};

use tracing::debug;

use super::scene::ImageTarget;
use super::{FrameSubscriber, SubscriberContext, owned};
use crate::controller::{SequenceMonitor, SequenceState, SequenceView};
use crate::input::FrameClock;
use crate::triggers::TriggerError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressImageSettings {
    /// Texture per completed-pose count; the first is shown before any pose
    /// completes and the last once the sequence completes.
    pub textures: Vec<String>,
    /// Triggers counted as a pose completion.
    pub complete_triggers: Vec<String>,
}

impl Default for ProgressImageSettings {
    fn default() -> Self {
        Self {
            textures: owned(&[
                "NoPoseComplete",
                "Pose1Complete",
                "Pose2Complete",
                "Pose3Complete",
            ]),
            complete_triggers: owned(&[
                "TPOSE_COMPLETE",
                "ARMS_UP_COMPLETE",
                "THIRD_POSE_NO_ARMS_COMPLETE",
            ]),
        }
    }
}

struct Inner<T> {
    monitor: SequenceMonitor,
    textures: Vec<String>,
    completed: Vec<String>,
    shown: Option<usize>,
    target: T,
}

impl<T: ImageTarget> Inner<T> {
    fn count(&self) -> usize {
        match self.monitor.sequence_state() {
            SequenceState::WaitingForStart => 0,
            SequenceState::InProgress => self.completed.len(),
            SequenceState::Completed => self.textures.len().saturating_sub(1),
        }
    }

    fn render(&mut self) {
        let Some(last) = self.textures.len().checked_sub(1) else {
            return;
        };
        let count = self.count().min(last);
        if self.shown == Some(count) {
            return;
        }
        self.shown = Some(count);
        debug!(count, texture = self.textures[count].as_str(), "progress image");
        self.target.set_texture(&self.textures[count]);
    }

    fn record_completion(&mut self) {
        let pose = self.monitor.current_pose().map(String::from);
        if let Some(pose) = pose.filter(|pose| !self.completed.contains(pose)) {
            self.completed.push(pose);
        }
        self.render();
    }
}

/// Shows one texture per number of distinct poses completed so far.
///
/// A pose repeated later in the sequence is only counted once.
pub struct ProgressImage<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T: ImageTarget + 'static> ProgressImage<T> {
    /// Registers the trigger handlers and shows the initial texture.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Unknown`] when a configured completion trigger
    /// is missing from the bus catalog.
    pub fn attach(
        context: &SubscriberContext,
        settings: ProgressImageSettings,
        target: T,
    ) -> Result<Self, TriggerError> {
        let complete_triggers = context.resolve_all(&settings.complete_triggers)?;
        let inner = Rc::new(RefCell::new(Inner {
            monitor: context.monitor.clone(),
            textures: settings.textures,
            completed: Vec::new(),
            shown: None,
            target,
        }));

        let bus = &context.bus;
        let lifecycle = context.lifecycle;
        {
            let inner = Rc::clone(&inner);
            bus.subscribe(lifecycle.sequence_start, move |_| {
                let mut inner = inner.borrow_mut();
                inner.completed.clear();
                inner.render();
            });
        }
        {
            let inner = Rc::clone(&inner);
            bus.subscribe(lifecycle.sequence_complete, move |_| {
                inner.borrow_mut().render();
            });
        }
        {
            let inner = Rc::clone(&inner);
            bus.subscribe(lifecycle.sequence_reset, move |_| {
                let mut inner = inner.borrow_mut();
                inner.completed.clear();
                inner.shown = None;
                inner.render();
            });
        }
        for trigger in complete_triggers {
            let inner = Rc::clone(&inner);
            bus.subscribe(trigger, move |_| inner.borrow_mut().record_completion());
        }

        inner.borrow_mut().render();
        Ok(Self { inner })
    }
}

impl<T> ProgressImage<T> {
    /// Distinct poses completed since the last start or reset.
    #[must_use]
    pub fn completed_poses(&self) -> Vec<String> {
        self.inner.borrow().completed.clone()
    }

    #[must_use]
    pub fn target(&self) -> Ref<'_, T> {
        Ref::map(self.inner.borrow(), |inner| &inner.target)
    }
}

impl<T: ImageTarget> FrameSubscriber for ProgressImage<T> {
    fn update(&self, _clock: &dyn FrameClock) {
        self.inner.borrow_mut().render();
    }
}
