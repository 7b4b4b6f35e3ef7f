#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use sequence_core::controller::PoseSequenceController;
use sequence_core::input::PoseLibrary;
use sequence_core::sequence::SequenceConfig;
use sequence_core::triggers::{TriggerBus, TriggerCatalog};

/// 60 fps frame delta.
pub const FRAME: Duration = Duration::from_micros(16_667);

/// Pose library backed by a fixed list of pose ids and a single struck pose.
#[derive(Debug, Default)]
pub struct ScriptedBody {
    known: Vec<String>,
    pub striking: Option<String>,
}

impl ScriptedBody {
    pub fn knowing(poses: &[&str]) -> Self {
        Self {
            known: poses.iter().map(|pose| (*pose).to_string()).collect(),
            striking: None,
        }
    }
}

impl PoseLibrary for ScriptedBody {
    type Pose = String;

    fn lookup_pose_frames(&self, ids: &[&str]) -> Vec<String> {
        ids.iter()
            .filter(|id| self.known.iter().any(|known| known == *id))
            .map(|id| (*id).to_string())
            .collect()
    }

    fn matches_pose(&mut self, pose: &String, _threshold: f32) -> bool {
        self.striking.as_ref() == Some(pose)
    }
}

pub struct Rig {
    pub bus: Rc<TriggerBus>,
    pub controller: PoseSequenceController<ScriptedBody>,
    pub published: Rc<RefCell<Vec<String>>>,
}

impl Rig {
    /// Controller over `config` with every catalog trigger recorded in order.
    pub fn new(config: &SequenceConfig, poses: &[&str]) -> Self {
        let bus = Rc::new(TriggerBus::new(TriggerCatalog::for_sequence(config)));
        let published = Rc::new(RefCell::new(Vec::new()));
        for (trigger, _) in bus.catalog().iter() {
            let published = Rc::clone(&published);
            bus.subscribe(trigger, move |event| {
                published.borrow_mut().push(event.name.to_string());
            });
        }
        let controller =
            PoseSequenceController::new(config, ScriptedBody::knowing(poses), Rc::clone(&bus));
        Self {
            bus,
            controller,
            published,
        }
    }

    pub fn strike(&mut self, pose: Option<&str>) {
        self.controller.library_mut().striking = pose.map(str::to_string);
    }

    /// Runs `frames` tracked frames.
    pub fn frames(&mut self, frames: usize) {
        for _ in 0..frames {
            self.controller.update(&true, &FRAME);
        }
    }

    pub fn count(&self, name: &str) -> usize {
        self.published
            .borrow()
            .iter()
            .filter(|published| *published == name)
            .count()
    }

    pub fn take_published(&self) -> Vec<String> {
        std::mem::take(&mut *self.published.borrow_mut())
    }
}
