//! Riddle panel that flips to its solved image after each pose.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell};
use core::fmt;
use core::time::Duration;

use tracing::debug;

use super::scene::ImageTarget;
use super::{FrameSubscriber, SubscriberContext};
use crate::input::FrameClock;
use crate::timers::{DelayQueue, TimerId};
use crate::triggers::TriggerError;

pub const DEFAULT_COMPLETION_DISPLAY_TIME: Duration = Duration::from_secs(2);

/// One riddle and the pose that solves it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiddleStage {
    pub complete_trigger: String,
    pub texture: String,
    pub solved_texture: String,
}

impl RiddleStage {
    #[must_use]
    pub fn new(
        complete_trigger: impl Into<String>,
        texture: impl Into<String>,
        solved_texture: impl Into<String>,
    ) -> Self {
        Self {
            complete_trigger: complete_trigger.into(),
            texture: texture.into(),
            solved_texture: solved_texture.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiddleSettings {
    pub stages: Vec<RiddleStage>,
    /// How long a solved image stays before the next riddle appears.
    pub completion_display_time: Duration,
}

impl Default for RiddleSettings {
    fn default() -> Self {
        Self {
            stages: Vec::from([
                RiddleStage::new("TPOSE_COMPLETE", "Riddle1", "Riddle1f"),
                RiddleStage::new("ARMS_UP_COMPLETE", "Riddle2", "Riddle2f"),
                RiddleStage::new("THIRD_POSE_NO_ARMS_COMPLETE", "Riddle3", "Riddle3f"),
            ]),
            completion_display_time: DEFAULT_COMPLETION_DISPLAY_TIME,
        }
    }
}

/// Panel currently on screen.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RiddlePanel {
    Riddle(usize),
    Solved(usize),
}

impl fmt::Display for RiddlePanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiddlePanel::Riddle(stage) => write!(f, "riddle {}", stage + 1),
            RiddlePanel::Solved(stage) => write!(f, "riddle {} solved", stage + 1),
        }
    }
}

struct Inner<T> {
    stages: Vec<RiddleStage>,
    display_time: Duration,
    panel: RiddlePanel,
    shown: Option<RiddlePanel>,
    timers: DelayQueue<usize>,
    pending: Option<TimerId>,
    target: T,
}

impl<T: ImageTarget> Inner<T> {
    fn show(&mut self, panel: RiddlePanel) {
        self.panel = panel;
        if self.shown == Some(panel) {
            return;
        }
        let texture = match panel {
            RiddlePanel::Riddle(stage) => self.stages.get(stage).map(|s| s.texture.as_str()),
            RiddlePanel::Solved(stage) => {
                self.stages.get(stage).map(|s| s.solved_texture.as_str())
            }
        };
        if let Some(texture) = texture {
            debug!(%panel, texture, "riddle image");
            self.target.set_texture(texture);
            self.shown = Some(panel);
        }
    }

    fn restart(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.timers.cancel(pending);
        }
        self.show(RiddlePanel::Riddle(0));
    }

    fn solve(&mut self, stage: usize) {
        if let Some(pending) = self.pending.take() {
            self.timers.cancel(pending);
        }
        self.show(RiddlePanel::Solved(stage));
        // The last solved image stays up.
        if stage + 1 < self.stages.len() {
            self.pending = Some(self.timers.schedule(self.display_time, stage + 1));
        }
    }

    fn tick(&mut self, delta: Duration) {
        for next in self.timers.advance(delta) {
            self.pending = None;
            self.show(RiddlePanel::Riddle(next));
        }
    }
}

/// Riddle image: each stage's completion trigger shows the solved image for
/// a while, then the next riddle.
pub struct RiddleImage<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T: ImageTarget + 'static> RiddleImage<T> {
    /// Registers the trigger handlers and shows the first riddle.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Unknown`] when a stage trigger is missing from
    /// the bus catalog.
    pub fn attach(
        context: &SubscriberContext,
        settings: RiddleSettings,
        target: T,
    ) -> Result<Self, TriggerError> {
        let stage_triggers = settings
            .stages
            .iter()
            .map(|stage| context.bus.resolve(&stage.complete_trigger))
            .collect::<Result<Vec<_>, _>>()?;

        let inner = Rc::new(RefCell::new(Inner {
            stages: settings.stages,
            display_time: settings.completion_display_time,
            panel: RiddlePanel::Riddle(0),
            shown: None,
            timers: DelayQueue::new(),
            pending: None,
            target,
        }));

        let bus = &context.bus;
        for lifecycle in [context.lifecycle.sequence_start, context.lifecycle.sequence_reset] {
            let inner = Rc::clone(&inner);
            bus.subscribe(lifecycle, move |_| inner.borrow_mut().restart());
        }
        for (stage, trigger) in stage_triggers.into_iter().enumerate() {
            let inner = Rc::clone(&inner);
            bus.subscribe(trigger, move |_| inner.borrow_mut().solve(stage));
        }

        inner.borrow_mut().show(RiddlePanel::Riddle(0));
        Ok(Self { inner })
    }
}

impl<T> RiddleImage<T> {
    #[must_use]
    pub fn panel(&self) -> RiddlePanel {
        self.inner.borrow().panel
    }

    #[must_use]
    pub fn target(&self) -> Ref<'_, T> {
        Ref::map(self.inner.borrow(), |inner| &inner.target)
    }
}

impl<T: ImageTarget> FrameSubscriber for RiddleImage<T> {
    fn update(&self, clock: &dyn FrameClock) {
        self.inner.borrow_mut().tick(clock.delta_time());
    }
}
