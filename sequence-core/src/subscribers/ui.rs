//! Instruction text, countdown and progress bar.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell};

use super::scene::{Rgba, SequenceUiTarget};
use super::{FrameSubscriber, SubscriberContext, owned};
use crate::controller::{SequenceMonitor, SequenceState, SequenceView};
use crate::input::FrameClock;

#[derive(Clone, Debug, PartialEq)]
pub struct UiSettings {
    /// Instruction per pose index; missing entries fall back to a generic line.
    pub pose_instructions: Vec<String>,
    pub waiting_instruction: String,
    pub completed_instruction: String,
    pub show_progress_bar: bool,
    pub show_timer: bool,
    pub progress_color: Rgba,
    pub completed_color: Rgba,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            pose_instructions: owned(&["Hold T-Pose", "Raise Your Arms Up"]),
            waiting_instruction: "Get ready to follow the pose sequence!".into(),
            completed_instruction: "Sequence Complete! Great job!".into(),
            show_progress_bar: true,
            show_timer: true,
            progress_color: Rgba::YELLOW,
            completed_color: Rgba::GREEN,
        }
    }
}

struct Inner<T> {
    monitor: SequenceMonitor,
    settings: UiSettings,
    target: T,
}

impl<T: SequenceUiTarget> Inner<T> {
    fn instruction(&self) -> String {
        match self.monitor.sequence_state() {
            SequenceState::WaitingForStart => self.settings.waiting_instruction.clone(),
            SequenceState::Completed => self.settings.completed_instruction.clone(),
            SequenceState::InProgress => self
                .settings
                .pose_instructions
                .get(self.monitor.pose_index())
                .cloned()
                .unwrap_or_else(|| {
                    format!(
                        "Hold the pose: {}",
                        self.monitor.current_pose().unwrap_or_default()
                    )
                }),
        }
    }

    fn render(&mut self) {
        let instruction = self.instruction();
        self.target.set_instruction(&instruction);

        let state = self.monitor.sequence_state();
        let progress = self.monitor.current_pose_progress();

        if self.settings.show_timer {
            if state == SequenceState::InProgress && progress > 0.0 {
                let minimum = self.monitor.minimum_hold_time().as_secs_f32();
                let left = minimum - progress * minimum;
                self.target.set_countdown(&format!("{left:.1}s"));
            } else {
                self.target.set_countdown("");
            }
        }

        if self.settings.show_progress_bar {
            if state == SequenceState::InProgress {
                self.target.set_bar_visible(true);
                self.target.set_bar_fill(progress.clamp(0.0, 1.0));
                let color = if progress >= 1.0 {
                    self.settings.completed_color
                } else {
                    self.settings.progress_color
                };
                self.target.set_bar_color(color);
            } else {
                self.target.set_bar_visible(false);
            }
        }
    }
}

/// Sequence HUD, refreshed every frame and on every sequence trigger.
pub struct SequenceUi<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T: SequenceUiTarget + 'static> SequenceUi<T> {
    /// Registers for the lifecycle triggers and every pose trigger of the
    /// monitored sequence, then renders once with the bar hidden.
    #[must_use]
    pub fn attach(context: &SubscriberContext, settings: UiSettings, mut target: T) -> Self {
        target.set_bar_visible(false);
        let inner = Rc::new(RefCell::new(Inner {
            monitor: context.monitor.clone(),
            settings,
            target,
        }));

        let bus = &context.bus;
        let lifecycle = context.lifecycle;
        let mut triggers = Vec::from([lifecycle.sequence_start, lifecycle.sequence_reset]);
        triggers.extend(context.pose_triggers());
        for trigger in triggers {
            let inner = Rc::clone(&inner);
            bus.subscribe(trigger, move |_| inner.borrow_mut().render());
        }
        {
            let inner = Rc::clone(&inner);
            bus.subscribe(lifecycle.sequence_complete, move |_| {
                let mut inner = inner.borrow_mut();
                inner.render();
                inner.target.set_bar_visible(false);
            });
        }

        inner.borrow_mut().render();
        Self { inner }
    }
}

impl<T> SequenceUi<T> {
    #[must_use]
    pub fn target(&self) -> Ref<'_, T> {
        Ref::map(self.inner.borrow(), |inner| &inner.target)
    }
}

impl<T: SequenceUiTarget> FrameSubscriber for SequenceUi<T> {
    fn update(&self, _clock: &dyn FrameClock) {
        self.inner.borrow_mut().render();
    }
}
