mod common;

use std::rc::Rc;

use sequence_core::controller::{PoseSequenceController, SequenceState, SequenceView};
use sequence_core::sequence::riddle::riddle_sequence;
use sequence_core::subscribers::{
    EffectSettings, EffectTarget, FinalPoseReveal, FinalRevealSettings, FrameSubscriber,
    ImageTarget, ProgressImage, ProgressImageSettings, Rgba, RiddleImage, RiddlePanel,
    RiddleSettings, SequenceEffects, SequenceUi, SequenceUiTarget, SubscriberContext, TextTarget,
    UiSettings,
};
use sequence_core::triggers::{TriggerBus, TriggerCatalog};

use common::{FRAME, ScriptedBody};

#[derive(Debug, Default)]
struct Image {
    history: Vec<String>,
}

impl Image {
    fn current(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }
}

impl ImageTarget for Image {
    fn set_texture(&mut self, texture: &str) {
        self.history.push(texture.to_string());
    }
}

#[derive(Debug, Default)]
struct Text {
    text: String,
    enabled: bool,
}

impl TextTarget for Text {
    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

#[derive(Debug)]
struct Hud {
    instruction: String,
    countdown: String,
    bar_visible: bool,
    fill: f32,
    colors: Vec<Rgba>,
}

impl Default for Hud {
    fn default() -> Self {
        Self {
            instruction: String::new(),
            countdown: String::new(),
            bar_visible: true,
            fill: 0.0,
            colors: Vec::new(),
        }
    }
}

impl SequenceUiTarget for Hud {
    fn set_instruction(&mut self, text: &str) {
        self.instruction = text.to_string();
    }

    fn set_countdown(&mut self, text: &str) {
        self.countdown = text.to_string();
    }

    fn set_bar_visible(&mut self, visible: bool) {
        self.bar_visible = visible;
    }

    fn set_bar_fill(&mut self, fill: f32) {
        self.fill = fill;
    }

    fn set_bar_color(&mut self, color: Rgba) {
        self.colors.push(color);
    }
}

#[derive(Debug, Default)]
struct Effects {
    calls: Vec<String>,
}

impl EffectTarget for Effects {
    fn set_objects_enabled(&mut self, group: &str, enabled: bool) {
        self.calls.push(format!("{group} objects={enabled}"));
    }

    fn start_tweens(&mut self, group: &str, tween: &str) {
        self.calls.push(format!("{group} tween={tween}"));
    }

    fn set_textures_playing(&mut self, group: &str, playing: bool) {
        self.calls.push(format!("{group} textures={playing}"));
    }

    fn set_particles_active(&mut self, group: &str, active: bool) {
        self.calls.push(format!("{group} particles={active}"));
    }
}

struct Lens {
    controller: PoseSequenceController<ScriptedBody>,
    progress: ProgressImage<Image>,
    riddle: RiddleImage<Image>,
    effects: SequenceEffects<Effects>,
    reveal: FinalPoseReveal<Text>,
    ui: SequenceUi<Hud>,
}

impl Lens {
    fn new() -> Self {
        let config = riddle_sequence();
        let bus = Rc::new(TriggerBus::new(TriggerCatalog::for_sequence(&config)));
        let controller = PoseSequenceController::new(
            &config,
            ScriptedBody::knowing(&["TPOSE", "ARMS_UP", "THIRD_POSE_NO_ARMS"]),
            Rc::clone(&bus),
        );
        let context =
            SubscriberContext::new(bus, controller.monitor(), &config.lifecycle).unwrap();

        Self {
            progress: ProgressImage::attach(
                &context,
                ProgressImageSettings::default(),
                Image::default(),
            )
            .unwrap(),
            riddle: RiddleImage::attach(&context, RiddleSettings::default(), Image::default())
                .unwrap(),
            effects: SequenceEffects::attach(&context, EffectSettings::default(), Effects::default())
                .unwrap(),
            reveal: FinalPoseReveal::attach(
                &context,
                FinalRevealSettings::default(),
                Text::default(),
            ),
            ui: SequenceUi::attach(&context, UiSettings::default(), Hud::default()),
            controller,
        }
    }

    fn frames(&mut self, frames: usize) {
        for _ in 0..frames {
            self.controller.update(&true, &FRAME);
            let subscribers: [&dyn FrameSubscriber; 5] = [
                &self.progress,
                &self.riddle,
                &self.effects,
                &self.reveal,
                &self.ui,
            ];
            for subscriber in subscribers {
                subscriber.update(&FRAME);
            }
        }
    }

    /// Strikes `pose` long enough for it to count.
    fn complete(&mut self, pose: &str) {
        self.controller.library_mut().striking = Some(pose.to_string());
        self.frames(62);
    }

    fn complete_all(&mut self) {
        for pose in ["TPOSE", "ARMS_UP", "THIRD_POSE_NO_ARMS", "TPOSE"] {
            self.complete(pose);
        }
        assert_eq!(self.controller.sequence_state(), SequenceState::Completed);
    }
}

#[test]
fn progress_image_counts_distinct_completed_poses() {
    let mut lens = Lens::new();
    assert_eq!(lens.progress.target().current(), Some("NoPoseComplete"));

    lens.controller.start_sequence();
    lens.complete("TPOSE");
    assert_eq!(lens.progress.target().current(), Some("Pose1Complete"));
    assert_eq!(lens.progress.completed_poses(), vec!["TPOSE"]);

    lens.complete("ARMS_UP");
    lens.complete("THIRD_POSE_NO_ARMS");
    assert_eq!(lens.progress.target().current(), Some("Pose3Complete"));

    lens.complete("TPOSE");
    assert_eq!(lens.progress.completed_poses().len(), 3);
    assert_eq!(lens.progress.target().current(), Some("Pose3Complete"));
    assert_eq!(
        lens.progress.target().history,
        vec![
            "NoPoseComplete",
            "Pose1Complete",
            "Pose2Complete",
            "Pose3Complete"
        ]
    );

    lens.controller.reset_sequence();
    assert_eq!(lens.progress.target().current(), Some("NoPoseComplete"));
    assert!(lens.progress.completed_poses().is_empty());
}

#[test]
fn riddle_shows_solution_then_next_riddle() {
    let mut lens = Lens::new();
    assert_eq!(lens.riddle.target().current(), Some("Riddle1"));

    lens.controller.start_sequence();
    lens.complete("TPOSE");
    assert_eq!(lens.riddle.panel(), RiddlePanel::Solved(0));
    assert_eq!(lens.riddle.target().current(), Some("Riddle1f"));

    lens.controller.library_mut().striking = None;
    lens.frames(100);
    assert_eq!(lens.riddle.panel(), RiddlePanel::Solved(0));
    lens.frames(30);
    assert_eq!(lens.riddle.panel(), RiddlePanel::Riddle(1));
    assert_eq!(lens.riddle.target().current(), Some("Riddle2"));
}

#[test]
fn riddle_reset_cancels_pending_advance() {
    let mut lens = Lens::new();
    lens.controller.start_sequence();
    lens.complete("TPOSE");
    lens.complete("ARMS_UP");
    assert_eq!(lens.riddle.panel(), RiddlePanel::Solved(1));

    lens.controller.reset_sequence();
    assert_eq!(lens.riddle.panel(), RiddlePanel::Riddle(0));
    lens.frames(200);
    assert_eq!(lens.riddle.panel(), RiddlePanel::Riddle(0));
    assert_eq!(lens.riddle.target().current(), Some("Riddle1"));
}

#[test]
fn final_riddle_solution_stays_up() {
    let mut lens = Lens::new();
    lens.controller.start_sequence();
    lens.complete_all();
    lens.frames(300);
    assert_eq!(lens.riddle.panel(), RiddlePanel::Solved(2));
    assert_eq!(lens.riddle.target().current(), Some("Riddle3f"));
}

#[test]
fn pose_effects_fade_out_after_the_pose_ends() {
    let mut lens = Lens::new();
    lens.controller.start_sequence();
    lens.controller.library_mut().striking = Some("TPOSE".into());
    lens.frames(1);
    assert_eq!(lens.effects.active_groups(), vec!["TPOSE"]);
    assert!(
        lens.effects
            .target()
            .calls
            .contains(&"TPOSE tween=FADEIN".to_string())
    );

    lens.frames(61);
    assert_eq!(lens.effects.pending_timers(), 1);
    assert!(
        lens.effects
            .target()
            .calls
            .contains(&"TPOSE tween=FADEOUT".to_string())
    );
    assert_eq!(lens.effects.active_groups(), vec!["TPOSE"]);

    lens.frames(40);
    assert!(lens.effects.active_groups().is_empty());
    assert_eq!(lens.effects.pending_timers(), 0);
}

#[test]
fn completion_effect_runs_for_its_duration() {
    let mut lens = Lens::new();
    lens.controller.start_sequence();
    lens.complete_all();
    assert!(lens.effects.completion_active());

    // Three seconds of play, then the half-second fade-out.
    lens.frames(200);
    assert!(lens.effects.completion_active());
    assert!(
        lens.effects
            .target()
            .calls
            .contains(&"SEQUENCE_COMPLETE tween=FADEOUT".to_string())
    );
    lens.frames(40);
    assert!(!lens.effects.completion_active());
    assert_eq!(lens.effects.pending_timers(), 0);
}

#[test]
fn reset_stops_completion_effect_immediately() {
    let mut lens = Lens::new();
    lens.controller.start_sequence();
    lens.complete_all();
    assert!(lens.effects.completion_active());

    lens.controller.reset_sequence();
    assert!(!lens.effects.completion_active());
    assert_eq!(lens.effects.pending_timers(), 0);
    assert!(
        lens.effects
            .target()
            .calls
            .ends_with(&[
                "SEQUENCE_COMPLETE objects=false".to_string(),
                "SEQUENCE_COMPLETE textures=false".to_string(),
                "SEQUENCE_COMPLETE particles=false".to_string(),
            ])
    );
}

#[test]
fn final_number_appears_only_while_complete() {
    let mut lens = Lens::new();
    assert!(!lens.reveal.target().enabled);

    lens.controller.start_sequence();
    lens.complete("TPOSE");
    lens.complete("ARMS_UP");
    lens.complete("THIRD_POSE_NO_ARMS");
    assert!(!lens.reveal.is_shown());

    lens.complete("TPOSE");
    assert!(lens.reveal.is_shown());
    assert_eq!(lens.reveal.target().text, "5");
    assert!(lens.reveal.target().enabled);

    lens.controller.reset_sequence();
    lens.frames(1);
    assert!(!lens.reveal.is_shown());
    assert!(!lens.reveal.target().enabled);
}

#[test]
fn hud_follows_the_active_pose() {
    let mut lens = Lens::new();
    assert_eq!(
        lens.ui.target().instruction,
        "Get ready to follow the pose sequence!"
    );
    assert!(!lens.ui.target().bar_visible);

    lens.controller.start_sequence();
    lens.controller.library_mut().striking = Some("TPOSE".into());
    lens.frames(32);
    {
        let hud = lens.ui.target();
        assert_eq!(hud.instruction, "Hold T-Pose");
        assert_eq!(hud.countdown, "0.5s");
        assert!(hud.bar_visible);
        assert!((hud.fill - 0.5).abs() < 0.01);
        assert_eq!(hud.colors.last(), Some(&Rgba::YELLOW));
    }

    lens.frames(30);
    assert!(lens.ui.target().colors.contains(&Rgba::GREEN));
    assert_eq!(lens.ui.target().instruction, "Raise Your Arms Up");

    lens.complete("ARMS_UP");
    assert_eq!(
        lens.ui.target().instruction,
        "Hold the pose: THIRD_POSE_NO_ARMS"
    );
    assert_eq!(lens.ui.target().countdown, "");
}

#[test]
fn hud_hides_the_bar_once_complete() {
    let mut lens = Lens::new();
    lens.controller.start_sequence();
    lens.complete_all();

    let hud = lens.ui.target();
    assert_eq!(hud.instruction, "Sequence Complete! Great job!");
    assert!(!hud.bar_visible);
}
