//! Per-pose visual effects and the sequence completion burst.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell};
use core::time::Duration;

use tracing::debug;

use super::scene::EffectTarget;
use super::{FrameSubscriber, SubscriberContext};
use crate::input::FrameClock;
use crate::timers::{DelayQueue, TimerId};
use crate::triggers::TriggerError;

pub const DEFAULT_COMPLETION_EFFECT_DURATION: Duration = Duration::from_secs(3);
pub const DEFAULT_FADE_OUT_TIME: Duration = Duration::from_millis(500);
pub const FADE_IN_TWEEN: &str = "FADEIN";
pub const FADE_OUT_TWEEN: &str = "FADEOUT";

/// Effects tied to one pose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectGroup {
    /// Group name handed to the [`EffectTarget`].
    pub name: String,
    pub start_trigger: String,
    pub end_trigger: String,
    pub complete_trigger: Option<String>,
    /// Whether the group fades through tweens instead of switching off.
    pub tweens: bool,
}

impl EffectGroup {
    /// Group named after the pose, using its default trigger names.
    #[must_use]
    pub fn for_pose(pose: &str) -> Self {
        Self {
            name: pose.into(),
            start_trigger: alloc::format!("{pose}_START"),
            end_trigger: alloc::format!("{pose}_END"),
            complete_trigger: Some(alloc::format!("{pose}_COMPLETE")),
            tweens: true,
        }
    }
}

/// Effects played when the whole sequence completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionEffect {
    pub name: String,
    pub tweens: bool,
    /// How long the effect plays before it is stopped.
    pub duration: Duration,
}

impl Default for CompletionEffect {
    fn default() -> Self {
        Self {
            name: "SEQUENCE_COMPLETE".into(),
            tweens: true,
            duration: DEFAULT_COMPLETION_EFFECT_DURATION,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectSettings {
    pub groups: Vec<EffectGroup>,
    pub completion: CompletionEffect,
    pub fade_in_tween: String,
    pub fade_out_tween: String,
    /// Time the fade-out tween takes before the group is switched off.
    pub fade_out_time: Duration,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            groups: Vec::from([EffectGroup::for_pose("TPOSE"), EffectGroup::for_pose("ARMS_UP")]),
            completion: CompletionEffect::default(),
            fade_in_tween: FADE_IN_TWEEN.into(),
            fade_out_tween: FADE_OUT_TWEEN.into(),
            fade_out_time: DEFAULT_FADE_OUT_TIME,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Group {
    Pose(usize),
    Completion,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Pending {
    /// Fade-out finished; switch the group off.
    Deactivate(Group),
    /// Completion effect ran its course; fade it out.
    StopCompletion,
}

impl Pending {
    fn group(self) -> Group {
        match self {
            Pending::Deactivate(group) => group,
            Pending::StopCompletion => Group::Completion,
        }
    }
}

struct Inner<T> {
    settings: EffectSettings,
    active: Vec<bool>,
    completion_active: bool,
    timers: DelayQueue<Pending>,
    pending: Vec<(TimerId, Pending)>,
    target: T,
}

impl<T: EffectTarget> Inner<T> {
    fn describe(&self, group: Group) -> (&str, bool) {
        match group {
            Group::Pose(index) => {
                let group = &self.settings.groups[index];
                (group.name.as_str(), group.tweens)
            }
            Group::Completion => (
                self.settings.completion.name.as_str(),
                self.settings.completion.tweens,
            ),
        }
    }

    fn set_active(&mut self, group: Group, active: bool) {
        match group {
            Group::Pose(index) => self.active[index] = active,
            Group::Completion => self.completion_active = active,
        }
    }

    fn is_active(&self, group: Group) -> bool {
        match group {
            Group::Pose(index) => self.active[index],
            Group::Completion => self.completion_active,
        }
    }

    fn cancel(&mut self, group: Group) {
        let timers = &mut self.timers;
        self.pending.retain(|(id, pending)| {
            if pending.group() == group {
                timers.cancel(*id);
                false
            } else {
                true
            }
        });
    }

    fn schedule(&mut self, delay: Duration, action: Pending) {
        let id = self.timers.schedule(delay, action);
        self.pending.push((id, action));
    }

    fn start(&mut self, group: Group) {
        self.cancel(group);
        let (name, tweens) = self.describe(group);
        debug!(group = name, "starting effects");
        let name = String::from(name);
        self.target.set_objects_enabled(&name, true);
        if tweens {
            self.target.start_tweens(&name, &self.settings.fade_in_tween);
        }
        self.target.set_textures_playing(&name, true);
        self.target.set_particles_active(&name, true);
        self.set_active(group, true);
    }

    fn end(&mut self, group: Group) {
        if !self.is_active(group) {
            return;
        }
        self.cancel(group);
        let (name, tweens) = self.describe(group);
        debug!(group = name, "ending effects");
        if tweens {
            let name = String::from(name);
            self.target.start_tweens(&name, &self.settings.fade_out_tween);
            self.schedule(self.settings.fade_out_time, Pending::Deactivate(group));
        } else {
            self.deactivate(group);
        }
    }

    fn deactivate(&mut self, group: Group) {
        let (name, _) = self.describe(group);
        let name = String::from(name);
        self.target.set_objects_enabled(&name, false);
        self.target.set_textures_playing(&name, false);
        self.target.set_particles_active(&name, false);
        self.set_active(group, false);
    }

    fn end_all_poses(&mut self) {
        for index in 0..self.settings.groups.len() {
            self.end(Group::Pose(index));
        }
    }

    fn sequence_complete(&mut self) {
        self.end_all_poses();
        self.start(Group::Completion);
        self.schedule(self.settings.completion.duration, Pending::StopCompletion);
    }

    fn sequence_reset(&mut self) {
        self.end_all_poses();
        self.cancel(Group::Completion);
        self.deactivate(Group::Completion);
    }

    fn tick(&mut self, delta: Duration) {
        for action in self.timers.advance(delta) {
            self.pending.retain(|(_, pending)| *pending != action);
            match action {
                Pending::Deactivate(group) => self.deactivate(group),
                Pending::StopCompletion => {
                    debug!("stopping completion effects");
                    self.end(Group::Completion);
                }
            }
        }
    }
}

/// Turns pose effect groups on and off in response to pose triggers.
pub struct SequenceEffects<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T: EffectTarget + 'static> SequenceEffects<T> {
    /// Registers the trigger handlers and switches every group off.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Unknown`] when a group trigger is missing from
    /// the bus catalog.
    pub fn attach(
        context: &SubscriberContext,
        settings: EffectSettings,
        mut target: T,
    ) -> Result<Self, TriggerError> {
        let bus = &context.bus;
        let mut bindings = Vec::with_capacity(settings.groups.len());
        for group in &settings.groups {
            let start = bus.resolve(&group.start_trigger)?;
            let end = bus.resolve(&group.end_trigger)?;
            let complete = bus
                .catalog()
                .resolve_optional(group.complete_trigger.as_deref())?;
            bindings.push((start, end, complete));
        }

        for group in &settings.groups {
            target.set_objects_enabled(&group.name, false);
        }
        target.set_objects_enabled(&settings.completion.name, false);

        let inner = Rc::new(RefCell::new(Inner {
            active: alloc::vec![false; settings.groups.len()],
            completion_active: false,
            settings,
            timers: DelayQueue::new(),
            pending: Vec::new(),
            target,
        }));

        for (index, (start, end, complete)) in bindings.into_iter().enumerate() {
            let group = Group::Pose(index);
            {
                let inner = Rc::clone(&inner);
                bus.subscribe(start, move |_| inner.borrow_mut().start(group));
            }
            {
                let inner = Rc::clone(&inner);
                bus.subscribe(end, move |_| inner.borrow_mut().end(group));
            }
            if let Some(complete) = complete {
                bus.subscribe(complete, |event| {
                    // Effects keep running until the pose's end trigger.
                    debug!(trigger = event.name, "pose completed");
                });
            }
        }
        {
            let inner = Rc::clone(&inner);
            bus.subscribe(context.lifecycle.sequence_complete, move |_| {
                inner.borrow_mut().sequence_complete();
            });
        }
        {
            let inner = Rc::clone(&inner);
            bus.subscribe(context.lifecycle.sequence_reset, move |_| {
                inner.borrow_mut().sequence_reset();
            });
        }

        Ok(Self { inner })
    }
}

impl<T> SequenceEffects<T> {
    /// Names of the pose groups currently active.
    #[must_use]
    pub fn active_groups(&self) -> Vec<String> {
        let inner = self.inner.borrow();
        inner
            .settings
            .groups
            .iter()
            .zip(&inner.active)
            .filter(|(_, active)| **active)
            .map(|(group, _)| group.name.clone())
            .collect()
    }

    #[must_use]
    pub fn completion_active(&self) -> bool {
        self.inner.borrow().completion_active
    }

    /// Number of fade-outs and completion stops still scheduled.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    #[must_use]
    pub fn target(&self) -> Ref<'_, T> {
        Ref::map(self.inner.borrow(), |inner| &inner.target)
    }
}

impl<T: EffectTarget> FrameSubscriber for SequenceEffects<T> {
    fn update(&self, clock: &dyn FrameClock) {
        self.inner.borrow_mut().tick(clock.delta_time());
    }
}
