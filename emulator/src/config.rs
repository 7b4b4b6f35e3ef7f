//! TOML lens configuration.
//!
//! The file mirrors the lens inspector: poses and their triggers are listed
//! as index-parallel arrays and times are given in seconds. Every field is
//! optional and falls back to the values shipped with the riddle lens.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use sequence_core::input::frame_interval;
use sequence_core::sequence::riddle::riddle_sequence;
use sequence_core::sequence::{
    LifecycleTriggers, PoseStep, RestartPolicy, SequenceConfig, TrackingTriggers,
};
use sequence_core::subscribers::{
    CompletionEffect, EffectGroup, EffectSettings, FinalRevealSettings, ProgressImageSettings, Rgba,
    RiddleSettings, RiddleStage, UiSettings,
};

/// Configuration file picked up from the working directory when no path is
/// given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "lens.toml";
pub const DEFAULT_FRAME_RATE: u32 = 30;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LensConfig {
    pub frame_rate: u32,
    pub library: LibrarySection,
    pub sequence: SequenceSection,
    pub progress_image: ProgressImageSection,
    pub riddle: RiddleSection,
    pub effects: EffectsSection,
    pub final_reveal: FinalRevealSection,
    pub ui: UiSection,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            library: LibrarySection::default(),
            sequence: SequenceSection::default(),
            progress_image: ProgressImageSection::default(),
            riddle: RiddleSection::default(),
            effects: EffectsSection::default(),
            final_reveal: FinalRevealSection::default(),
            ui: UiSection::default(),
        }
    }
}

impl LensConfig {
    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading lens configuration {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parses configuration text.
    ///
    /// # Errors
    ///
    /// Fails on TOML syntax errors, unknown keys or mistyped values.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads `explicit` when given, else [`DEFAULT_CONFIG_PATH`] when it
    /// exists, else the built-in defaults.
    ///
    /// # Errors
    ///
    /// Propagates [`load`](Self::load) failures.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::load(fallback);
        }
        info!("no lens configuration found, using built-in defaults");
        Ok(Self::default())
    }

    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        frame_interval(self.frame_rate)
    }

    /// Converts the inspector-style sequence section into a
    /// [`SequenceConfig`].
    ///
    /// # Errors
    ///
    /// Fails when a time is negative or not finite. Structural problems are
    /// left to the controller, which disables itself on them.
    pub fn sequence_config(&self) -> Result<SequenceConfig> {
        let section = &self.sequence;
        let mut config = SequenceConfig::from_parallel(
            &section.pose_ids,
            &section.start_triggers,
            &section.end_triggers,
            &section.complete_triggers,
        )
        .with_minimum_hold_time(seconds(
            section.minimum_hold_time,
            "sequence.minimum_hold_time",
        )?)
        .with_match_threshold(section.match_threshold)
        .with_lifecycle(LifecycleTriggers {
            sequence_start: section.sequence_start_trigger.clone(),
            sequence_complete: section.sequence_complete_trigger.clone(),
            sequence_reset: section.sequence_reset_trigger.clone(),
        });
        if section.use_tracking_triggers {
            config = config.with_tracking_triggers(TrackingTriggers {
                started: section.tracking_started_trigger.clone(),
                lost: section.tracking_lost_trigger.clone(),
            });
        }
        if section.require_reset {
            config = config.with_restart_policy(RestartPolicy::RequireReset);
        }
        Ok(config)
    }
}

/// Poses the simulated body can strike.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LibrarySection {
    pub poses: Vec<String>,
}

impl Default for LibrarySection {
    fn default() -> Self {
        Self {
            poses: owned(&["TPOSE", "ARMS_UP", "THIRD_POSE_NO_ARMS"]),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SequenceSection {
    pub pose_ids: Vec<String>,
    pub start_triggers: Vec<String>,
    pub end_triggers: Vec<String>,
    pub complete_triggers: Vec<String>,
    pub sequence_start_trigger: String,
    pub sequence_complete_trigger: String,
    pub sequence_reset_trigger: String,
    /// Seconds.
    pub minimum_hold_time: f32,
    pub match_threshold: f32,
    pub use_tracking_triggers: bool,
    pub tracking_started_trigger: String,
    pub tracking_lost_trigger: String,
    pub require_reset: bool,
}

impl Default for SequenceSection {
    fn default() -> Self {
        let riddle = riddle_sequence();
        let tracking = TrackingTriggers::default();
        let collect = |pick: fn(&PoseStep) -> Option<&String>| {
            riddle.steps.iter().filter_map(pick).cloned().collect()
        };
        Self {
            pose_ids: riddle.steps.iter().map(|step| step.pose.clone()).collect(),
            start_triggers: collect(|step| step.start_trigger.as_ref()),
            end_triggers: collect(|step| step.end_trigger.as_ref()),
            complete_triggers: collect(|step| step.complete_trigger.as_ref()),
            sequence_start_trigger: riddle.lifecycle.sequence_start,
            sequence_complete_trigger: riddle.lifecycle.sequence_complete,
            sequence_reset_trigger: riddle.lifecycle.sequence_reset,
            minimum_hold_time: riddle.minimum_hold_time.as_secs_f32(),
            match_threshold: riddle.match_threshold,
            use_tracking_triggers: true,
            tracking_started_trigger: tracking.started,
            tracking_lost_trigger: tracking.lost,
            require_reset: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressImageSection {
    pub enabled: bool,
    pub textures: Vec<String>,
    pub complete_triggers: Vec<String>,
}

impl Default for ProgressImageSection {
    fn default() -> Self {
        let defaults = ProgressImageSettings::default();
        Self {
            enabled: true,
            textures: defaults.textures,
            complete_triggers: defaults.complete_triggers,
        }
    }
}

impl ProgressImageSection {
    #[must_use]
    pub fn settings(&self) -> ProgressImageSettings {
        ProgressImageSettings {
            textures: self.textures.clone(),
            complete_triggers: self.complete_triggers.clone(),
        }
    }
}

/// Riddle stages as parallel lists.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RiddleSection {
    pub enabled: bool,
    pub complete_triggers: Vec<String>,
    pub textures: Vec<String>,
    pub solved_textures: Vec<String>,
    /// Seconds.
    pub completion_display_time: f32,
}

impl Default for RiddleSection {
    fn default() -> Self {
        let defaults = RiddleSettings::default();
        Self {
            enabled: true,
            complete_triggers: defaults
                .stages
                .iter()
                .map(|stage| stage.complete_trigger.clone())
                .collect(),
            textures: defaults
                .stages
                .iter()
                .map(|stage| stage.texture.clone())
                .collect(),
            solved_textures: defaults
                .stages
                .iter()
                .map(|stage| stage.solved_texture.clone())
                .collect(),
            completion_display_time: defaults.completion_display_time.as_secs_f32(),
        }
    }
}

impl RiddleSection {
    /// Builds one stage per completion trigger.
    ///
    /// # Errors
    ///
    /// Fails when the texture lists do not match the trigger list or the
    /// display time is invalid.
    pub fn settings(&self) -> Result<RiddleSettings> {
        let stages = self.complete_triggers.len();
        anyhow::ensure!(
            self.textures.len() == stages && self.solved_textures.len() == stages,
            "riddle needs one texture and one solved texture per trigger ({stages} triggers)"
        );
        Ok(RiddleSettings {
            stages: self
                .complete_triggers
                .iter()
                .zip(&self.textures)
                .zip(&self.solved_textures)
                .map(|((trigger, texture), solved)| RiddleStage::new(trigger, texture, solved))
                .collect(),
            completion_display_time: seconds(
                self.completion_display_time,
                "riddle.completion_display_time",
            )?,
        })
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EffectsSection {
    pub enabled: bool,
    /// Effect groups named after poses, driven by `{pose}_START` / `{pose}_END`.
    pub pose_names: Vec<String>,
    pub use_tweens: bool,
    pub completion_group: String,
    /// Seconds.
    pub completion_effect_duration: f32,
    pub fade_in_tween: String,
    pub fade_out_tween: String,
    /// Seconds.
    pub fade_out_time: f32,
}

impl Default for EffectsSection {
    fn default() -> Self {
        let defaults = EffectSettings::default();
        Self {
            enabled: true,
            pose_names: defaults.groups.iter().map(|group| group.name.clone()).collect(),
            use_tweens: true,
            completion_group: defaults.completion.name,
            completion_effect_duration: defaults.completion.duration.as_secs_f32(),
            fade_in_tween: defaults.fade_in_tween,
            fade_out_tween: defaults.fade_out_tween,
            fade_out_time: defaults.fade_out_time.as_secs_f32(),
        }
    }
}

impl EffectsSection {
    /// # Errors
    ///
    /// Fails when a duration is invalid.
    pub fn settings(&self) -> Result<EffectSettings> {
        Ok(EffectSettings {
            groups: self
                .pose_names
                .iter()
                .map(|pose| EffectGroup {
                    tweens: self.use_tweens,
                    ..EffectGroup::for_pose(pose)
                })
                .collect(),
            completion: CompletionEffect {
                name: self.completion_group.clone(),
                tweens: self.use_tweens,
                duration: seconds(
                    self.completion_effect_duration,
                    "effects.completion_effect_duration",
                )?,
            },
            fade_in_tween: self.fade_in_tween.clone(),
            fade_out_tween: self.fade_out_tween.clone(),
            fade_out_time: seconds(self.fade_out_time, "effects.fade_out_time")?,
        })
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FinalRevealSection {
    pub number: String,
}

impl Default for FinalRevealSection {
    fn default() -> Self {
        Self {
            number: FinalRevealSettings::default().number,
        }
    }
}

impl FinalRevealSection {
    #[must_use]
    pub fn settings(&self) -> FinalRevealSettings {
        FinalRevealSettings {
            number: self.number.clone(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UiSection {
    pub pose_instructions: Vec<String>,
    pub waiting_instruction: String,
    pub completed_instruction: String,
    pub show_progress_bar: bool,
    pub show_timer: bool,
    /// RGBA, each channel in `[0, 1]`.
    pub progress_color: [f32; 4],
    pub completed_color: [f32; 4],
}

impl Default for UiSection {
    fn default() -> Self {
        let defaults = UiSettings::default();
        Self {
            pose_instructions: defaults.pose_instructions,
            waiting_instruction: defaults.waiting_instruction,
            completed_instruction: defaults.completed_instruction,
            show_progress_bar: defaults.show_progress_bar,
            show_timer: defaults.show_timer,
            progress_color: channels(defaults.progress_color),
            completed_color: channels(defaults.completed_color),
        }
    }
}

impl UiSection {
    #[must_use]
    pub fn settings(&self) -> UiSettings {
        UiSettings {
            pose_instructions: self.pose_instructions.clone(),
            waiting_instruction: self.waiting_instruction.clone(),
            completed_instruction: self.completed_instruction.clone(),
            show_progress_bar: self.show_progress_bar,
            show_timer: self.show_timer,
            progress_color: color(self.progress_color),
            completed_color: color(self.completed_color),
        }
    }
}

fn seconds(value: f32, field: &str) -> Result<Duration> {
    Duration::try_from_secs_f32(value)
        .with_context(|| format!("{field} = {value} is not a valid time"))
}

fn channels(color: Rgba) -> [f32; 4] {
    [color.r, color.g, color.b, color.a]
}

fn color([r, g, b, a]: [f32; 4]) -> Rgba {
    Rgba::new(r, g, b, a)
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_riddle_lens() {
        let config = LensConfig::default();
        let sequence = config.sequence_config().unwrap();
        assert_eq!(sequence.pose_count(), 4);
        assert_eq!(
            sequence.steps[3].start_trigger.as_deref(),
            Some("TPOSE_2_START")
        );
        assert!(sequence.tracking_triggers.is_some());
        assert_eq!(sequence.restart_policy, RestartPolicy::Restart);
        assert_eq!(config.frame_interval(), Duration::from_nanos(33_333_333));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config = LensConfig::parse(
            r#"
            frame_rate = 60

            [sequence]
            pose_ids = ["TPOSE"]
            start_triggers = ["TPOSE_START"]
            end_triggers = ["TPOSE_END"]
            complete_triggers = ["TPOSE_COMPLETE"]
            minimum_hold_time = 0.5
            require_reset = true
            "#,
        )
        .unwrap();

        let sequence = config.sequence_config().unwrap();
        assert_eq!(sequence.pose_count(), 1);
        assert_eq!(sequence.minimum_hold_time, Duration::from_millis(500));
        assert_eq!(sequence.restart_policy, RestartPolicy::RequireReset);
        assert_eq!(config.ui, UiSection::default());
    }

    #[test]
    fn sample_file_matches_defaults() {
        let config = LensConfig::parse(include_str!("../lens.toml")).unwrap();
        assert_eq!(config, LensConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(LensConfig::parse("[sequence]\nhold = 1.0\n").is_err());
    }

    #[test]
    fn negative_times_are_rejected() {
        let config = LensConfig::parse("[sequence]\nminimum_hold_time = -1.0\n").unwrap();
        assert!(config.sequence_config().is_err());
    }

    #[test]
    fn riddle_lists_must_line_up() {
        let config =
            LensConfig::parse("[riddle]\ncomplete_triggers = [\"TPOSE_COMPLETE\"]\n").unwrap();
        assert!(config.riddle.settings().is_err());
    }
}
