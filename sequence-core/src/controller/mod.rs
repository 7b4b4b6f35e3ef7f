//! Pose sequence state machine.
//!
//! [`PoseSequenceController`] walks the configured poses in order. Each pose
//! must be matched on two consecutive frames before hold time starts to
//! accumulate, and must then stay matched until the hold reaches the minimum.
//! Losing the pose or the tracked body while holding drops the progress on
//! that pose, never on poses already completed.
//!
//! The controller owns its runtime exclusively. Everything else observes it
//! through triggers published on the injected [`TriggerBus`] or through a
//! [`SequenceMonitor`].

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::time::Duration;

use tracing::{debug, error, warn};

use crate::input::{FrameClock, PoseLibrary, TrackingSignal};
use crate::sequence::{ConfigError, RestartPolicy, SequenceConfig, TrackingTriggers};
use crate::triggers::{Trigger, TriggerBus};

mod monitor;
mod state;

pub use monitor::{BoundStep, SequenceMonitor, SequenceView};
pub use state::{PoseState, SequenceSnapshot, SequenceState};

use state::SequenceRuntime;

/// Lifecycle requests queued by trigger handlers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControlCommand {
    Start,
    Reset,
}

#[derive(Copy, Clone, Debug)]
struct LifecycleBinding {
    sequence_start: Trigger,
    sequence_complete: Trigger,
    sequence_reset: Trigger,
}

struct Binding<P> {
    lifecycle: LifecycleBinding,
    poses: Vec<P>,
}

type Mailbox = Rc<RefCell<VecDeque<ControlCommand>>>;

/// Drives a pose sequence one frame at a time.
pub struct PoseSequenceController<L: PoseLibrary> {
    library: L,
    bus: Rc<TriggerBus>,
    steps: Rc<[BoundStep]>,
    binding: Option<Binding<L::Pose>>,
    fault: Option<ConfigError>,
    minimum_hold_time: Duration,
    match_threshold: f32,
    restart_policy: RestartPolicy,
    runtime: SequenceRuntime,
    board: Rc<Cell<SequenceSnapshot>>,
    mailbox: Mailbox,
}

impl<L: PoseLibrary> PoseSequenceController<L> {
    /// Binds the configuration to the bus and the pose library.
    ///
    /// Construction never fails. A configuration that does not validate, a
    /// trigger name missing from the bus catalog, or a pose the library cannot
    /// load is logged and leaves the controller disabled for the session:
    /// updates do nothing and starts are refused. Inspect [`fault`](Self::fault)
    /// or use [`try_new`](Self::try_new) to observe the error.
    pub fn new(config: &SequenceConfig, library: L, bus: Rc<TriggerBus>) -> Self {
        let mailbox: Mailbox = Rc::new(RefCell::new(VecDeque::new()));
        let bound = bind(config, &library, &bus).and_then(|bound| {
            if let Some(tracking) = &config.tracking_triggers {
                subscribe_tracking(&bus, &mailbox, tracking)?;
            }
            Ok(bound)
        });
        let (steps, binding, fault) = match bound {
            Ok((steps, binding)) => (steps, Some(binding), None),
            Err(err) => {
                error!(%err, "pose sequence disabled");
                (unbound_steps(config), None, Some(err))
            }
        };

        if binding.is_some() {
            debug!(poses = steps.len(), "pose sequence controller initialized");
        }

        Self {
            library,
            bus,
            steps: Rc::from(steps),
            binding,
            fault,
            minimum_hold_time: config.minimum_hold_time,
            match_threshold: config.match_threshold,
            restart_policy: config.restart_policy,
            runtime: SequenceRuntime::default(),
            board: Rc::new(Cell::new(SequenceSnapshot::waiting(config.minimum_hold_time))),
            mailbox,
        }
    }

    /// Like [`new`](Self::new), but returns the configuration fault instead
    /// of a disabled controller.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] that would have disabled the controller.
    pub fn try_new(
        config: &SequenceConfig,
        library: L,
        bus: Rc<TriggerBus>,
    ) -> Result<Self, ConfigError> {
        let mut controller = Self::new(config, library, bus);
        match controller.fault.take() {
            Some(fault) => Err(fault),
            None => Ok(controller),
        }
    }

    /// Configuration fault that disabled the controller, if any.
    #[must_use]
    pub fn fault(&self) -> Option<&ConfigError> {
        self.fault.as_ref()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.binding.is_some()
    }

    #[must_use]
    pub fn library(&self) -> &L {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut L {
        &mut self.library
    }

    #[must_use]
    pub fn bus(&self) -> &Rc<TriggerBus> {
        &self.bus
    }

    #[must_use]
    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    /// Read-only handle that tracks this controller's state.
    #[must_use]
    pub fn monitor(&self) -> SequenceMonitor {
        SequenceMonitor::new(Rc::clone(&self.steps), Rc::clone(&self.board))
    }

    /// Queues a lifecycle command for the next [`update`](Self::update).
    pub fn queue(&self, command: ControlCommand) {
        self.mailbox.borrow_mut().push_back(command);
    }

    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.mailbox.borrow().len()
    }

    /// Starts the sequence from the first pose and publishes the start
    /// trigger. Returns whether a start happened.
    ///
    /// Under [`RestartPolicy::Restart`] a running sequence restarts from the
    /// first pose without publishing a reset. Under
    /// [`RestartPolicy::RequireReset`] the call is refused unless the
    /// sequence is waiting for start.
    pub fn start_sequence(&mut self) -> bool {
        let Some(lifecycle) = self.binding.as_ref().map(|binding| binding.lifecycle) else {
            warn!("start refused: pose sequence is disabled");
            return false;
        };

        match (self.runtime.sequence_state, self.restart_policy) {
            (SequenceState::WaitingForStart, _) => {}
            (state, RestartPolicy::RequireReset) => {
                warn!(%state, "start refused until the sequence is reset");
                return false;
            }
            (SequenceState::InProgress, RestartPolicy::Restart) => {
                warn!(
                    pose_index = self.runtime.pose_index,
                    "restarting a sequence already in progress"
                );
            }
            (SequenceState::Completed, RestartPolicy::Restart) => {}
        }

        debug!("starting pose sequence");
        self.runtime.rewind(SequenceState::InProgress);
        self.publish(Some(lifecycle.sequence_start));
        self.sync_board();
        true
    }

    /// Returns to waiting for start and publishes the reset trigger.
    pub fn reset_sequence(&mut self) {
        let Some(lifecycle) = self.binding.as_ref().map(|binding| binding.lifecycle) else {
            return;
        };

        debug!("resetting pose sequence");
        self.runtime.rewind(SequenceState::WaitingForStart);
        self.publish(Some(lifecycle.sequence_reset));
        self.sync_board();
    }

    /// Evaluates one frame.
    ///
    /// Queued lifecycle commands are applied first. While the sequence is in
    /// progress, the active pose is checked against the library and the hold
    /// timer advances by the clock's delta.
    pub fn update<T, C>(&mut self, tracking: &T, clock: &C)
    where
        T: TrackingSignal + ?Sized,
        C: FrameClock + ?Sized,
    {
        if self.binding.is_none() {
            return;
        }

        self.apply_queued_commands();

        if self.runtime.sequence_state.is_active() {
            self.evaluate_pose(tracking.is_tracking(), clock.delta_time());
        }

        self.sync_board();
    }

    fn apply_queued_commands(&mut self) {
        loop {
            let next = self.mailbox.borrow_mut().pop_front();
            match next {
                Some(ControlCommand::Start) => {
                    self.start_sequence();
                }
                Some(ControlCommand::Reset) => self.reset_sequence(),
                None => break,
            }
        }
    }

    fn evaluate_pose(&mut self, tracking: bool, delta: Duration) {
        let index = self.runtime.pose_index;
        let steps = Rc::clone(&self.steps);
        let Some(step) = steps.get(index) else {
            return;
        };

        if !tracking {
            if self.runtime.pose_state == PoseState::Holding {
                debug!(pose = step.pose.as_str(), "tracking lost, resetting pose progress");
                self.runtime.release_pose();
                self.publish(step.end);
            }
            return;
        }

        let matched = match self.binding.as_ref().and_then(|binding| binding.poses.get(index)) {
            Some(pose) => self.library.matches_pose(pose, self.match_threshold),
            None => return,
        };

        match (self.runtime.pose_state, matched) {
            (PoseState::NotDetected, true) => {
                debug!(pose = step.pose.as_str(), "detected pose");
                self.runtime.pose_state = PoseState::Detected;
                self.runtime.hold_time = Duration::ZERO;
                self.publish(step.start);
            }
            (PoseState::Detected, true) => {
                debug!(pose = step.pose.as_str(), "holding pose");
                self.runtime.pose_state = PoseState::Holding;
                self.runtime.hold_time = Duration::ZERO;
            }
            (PoseState::Detected, false) => {
                debug!(pose = step.pose.as_str(), "lost pose");
                self.runtime.pose_state = PoseState::NotDetected;
                self.publish(step.end);
            }
            (PoseState::Holding, true) => {
                self.runtime.hold_time = self.runtime.hold_time.saturating_add(delta);
                if self.runtime.hold_time >= self.minimum_hold_time {
                    self.runtime.pose_state = PoseState::Completed;
                    self.complete_pose(step);
                }
            }
            (PoseState::Holding, false) => {
                debug!(
                    pose = step.pose.as_str(),
                    held = ?self.runtime.hold_time,
                    "lost pose while holding"
                );
                self.runtime.release_pose();
                self.publish(step.end);
            }
            (PoseState::NotDetected | PoseState::Completed, false)
            | (PoseState::Completed, true) => {}
        }
    }

    fn complete_pose(&mut self, step: &BoundStep) {
        debug!(
            pose = step.pose.as_str(),
            held = ?self.runtime.hold_time,
            "completed pose"
        );
        self.publish(step.complete);
        self.publish(step.end);

        self.runtime.pose_index += 1;
        if self.runtime.pose_index >= self.steps.len() {
            self.runtime.sequence_state = SequenceState::Completed;
            debug!("sequence completed");
            let complete = self
                .binding
                .as_ref()
                .map(|binding| binding.lifecycle.sequence_complete);
            self.publish(complete);
        } else {
            self.runtime.release_pose();
            if let Some(next) = self.steps.get(self.runtime.pose_index) {
                debug!(pose = next.pose.as_str(), "next pose");
            }
        }
    }

    fn publish(&self, trigger: Option<Trigger>) {
        if trigger.is_some() {
            self.sync_board();
            self.bus.publish_optional(trigger);
        }
    }

    fn sync_board(&self) {
        self.board.set(self.runtime.snapshot(self.minimum_hold_time));
    }
}

impl<L: PoseLibrary> SequenceView for PoseSequenceController<L> {
    fn snapshot(&self) -> SequenceSnapshot {
        self.runtime.snapshot(self.minimum_hold_time)
    }

    fn steps(&self) -> &[BoundStep] {
        &self.steps
    }
}

fn bind<L: PoseLibrary>(
    config: &SequenceConfig,
    library: &L,
    bus: &TriggerBus,
) -> Result<(Vec<BoundStep>, Binding<L::Pose>), ConfigError> {
    config.validate()?;

    let catalog = bus.catalog();
    let lifecycle = LifecycleBinding {
        sequence_start: catalog.resolve(&config.lifecycle.sequence_start)?,
        sequence_complete: catalog.resolve(&config.lifecycle.sequence_complete)?,
        sequence_reset: catalog.resolve(&config.lifecycle.sequence_reset)?,
    };

    let mut steps = Vec::with_capacity(config.steps.len());
    let mut poses = Vec::with_capacity(config.steps.len());
    for (index, step) in config.steps.iter().enumerate() {
        steps.push(BoundStep {
            pose: step.pose.clone(),
            start: catalog.resolve_optional(step.start_trigger.as_deref())?,
            end: catalog.resolve_optional(step.end_trigger.as_deref())?,
            complete: catalog.resolve_optional(step.complete_trigger.as_deref())?,
        });

        let pose = library
            .lookup_pose_frames(&[step.pose.as_str()])
            .into_iter()
            .next()
            .ok_or_else(|| ConfigError::UnresolvablePose {
                index,
                pose: step.pose.clone(),
            })?;
        debug!(pose = step.pose.as_str(), "loaded pose");
        poses.push(pose);
    }

    Ok((steps, Binding { lifecycle, poses }))
}

fn subscribe_tracking(
    bus: &TriggerBus,
    mailbox: &Mailbox,
    tracking: &TrackingTriggers,
) -> Result<(), ConfigError> {
    let started = bus.resolve(&tracking.started)?;
    let lost = bus.resolve(&tracking.lost)?;

    let queue = Rc::clone(mailbox);
    bus.subscribe(started, move |_| {
        queue.borrow_mut().push_back(ControlCommand::Start);
    });
    let queue = Rc::clone(mailbox);
    bus.subscribe(lost, move |_| {
        queue.borrow_mut().push_back(ControlCommand::Reset);
    });
    Ok(())
}

fn unbound_steps(config: &SequenceConfig) -> Vec<BoundStep> {
    config
        .steps
        .iter()
        .map(|step| BoundStep::unbound(&step.pose))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::PoseStep;
    use crate::triggers::TriggerCatalog;
    use alloc::string::String;
    use alloc::vec;

    struct StaticLibrary {
        known: Vec<&'static str>,
        matching: Option<String>,
    }

    impl PoseLibrary for StaticLibrary {
        type Pose = String;

        fn lookup_pose_frames(&self, ids: &[&str]) -> Vec<String> {
            ids.iter()
                .filter(|id| self.known.iter().any(|known| *known == **id))
                .map(|id| String::from(*id))
                .collect()
        }

        fn matches_pose(&mut self, pose: &String, _threshold: f32) -> bool {
            self.matching.as_ref() == Some(pose)
        }
    }

    fn library() -> StaticLibrary {
        StaticLibrary {
            known: vec!["TPOSE", "ARMS_UP"],
            matching: None,
        }
    }

    fn config() -> SequenceConfig {
        SequenceConfig::new(vec![
            PoseStep::with_default_triggers("TPOSE"),
            PoseStep::with_default_triggers("ARMS_UP"),
        ])
    }

    fn bus_for(config: &SequenceConfig) -> Rc<TriggerBus> {
        Rc::new(TriggerBus::new(TriggerCatalog::for_sequence(config)))
    }

    const FRAME: Duration = Duration::from_millis(100);

    #[test]
    fn unknown_pose_disables_the_controller() {
        let config = SequenceConfig::new(vec![PoseStep::with_default_triggers("CARTWHEEL")]);
        let bus = bus_for(&config);
        let mut controller = PoseSequenceController::new(&config, library(), Rc::clone(&bus));

        assert!(!controller.is_enabled());
        assert!(matches!(
            controller.fault(),
            Some(ConfigError::UnresolvablePose { index: 0, .. })
        ));
        assert!(!controller.start_sequence());
        controller.update(&true, &FRAME);
        assert_eq!(controller.sequence_state(), SequenceState::WaitingForStart);
        assert_eq!(bus.published(), 0);
    }

    #[test]
    fn trigger_missing_from_catalog_is_a_configuration_fault() {
        let config = config();
        let bus = Rc::new(TriggerBus::new(TriggerCatalog::new().with_names(["TPOSE_START"])));
        let result = PoseSequenceController::try_new(&config, library(), bus);
        assert!(matches!(result, Err(ConfigError::Trigger(_))));
    }

    #[test]
    fn require_reset_refuses_restart_while_running() {
        let config = config().with_restart_policy(RestartPolicy::RequireReset);
        let bus = bus_for(&config);
        let mut controller = PoseSequenceController::new(&config, library(), bus);

        assert!(controller.start_sequence());
        assert!(!controller.start_sequence());
        controller.reset_sequence();
        assert!(controller.start_sequence());
    }

    #[test]
    fn restart_policy_rewinds_a_running_sequence() {
        let config = config();
        let bus = bus_for(&config);
        let mut controller = PoseSequenceController::new(&config, library(), Rc::clone(&bus));

        controller.start_sequence();
        controller.library_mut().matching = Some("TPOSE".into());
        controller.update(&true, &FRAME);
        controller.update(&true, &FRAME);
        assert_eq!(controller.pose_state(), PoseState::Holding);

        assert!(controller.start_sequence());
        assert_eq!(controller.pose_state(), PoseState::NotDetected);
        assert_eq!(
            bus.journal_names(),
            vec!["SEQUENCE_START", "TPOSE_START", "SEQUENCE_START"]
        );
    }

    #[test]
    fn tracking_triggers_queue_commands_for_the_next_frame() {
        let config = config().with_tracking_triggers(TrackingTriggers::default());
        let bus = bus_for(&config);
        let mut controller = PoseSequenceController::new(&config, library(), Rc::clone(&bus));

        bus.publish_named("FULL_BODY_TRACKING_STARTED").unwrap();
        assert_eq!(controller.sequence_state(), SequenceState::WaitingForStart);
        assert_eq!(controller.pending_commands(), 1);

        controller.update(&true, &FRAME);
        assert_eq!(controller.sequence_state(), SequenceState::InProgress);

        bus.publish_named("FULL_BODY_TRACKING_LOST").unwrap();
        controller.update(&false, &FRAME);
        assert_eq!(controller.sequence_state(), SequenceState::WaitingForStart);
    }

    #[test]
    fn monitor_reflects_state_inside_trigger_handlers() {
        let config = config();
        let bus = bus_for(&config);
        let mut controller = PoseSequenceController::new(&config, library(), Rc::clone(&bus));
        let monitor = controller.monitor();

        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            let monitor = monitor.clone();
            bus.subscribe_named("TPOSE_COMPLETE", move |_| {
                seen.borrow_mut().push((
                    monitor.current_pose().map(String::from),
                    monitor.pose_state(),
                ));
            })
            .unwrap();
        }

        controller.start_sequence();
        controller.library_mut().matching = Some("TPOSE".into());
        for _ in 0..14 {
            controller.update(&true, &FRAME);
        }

        assert_eq!(
            *seen.borrow(),
            vec![(Some(String::from("TPOSE")), PoseState::Completed)]
        );
        assert_eq!(monitor.current_pose(), Some("ARMS_UP"));
        assert_eq!(monitor.pose_index(), 1);
    }
}
