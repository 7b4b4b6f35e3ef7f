//! Recording scene targets for the terminal.
//!
//! Each target keeps the last state the subscribers drew on it so `status`
//! can print the scene. [`Scene`] attaches every subscriber the configuration
//! enables and drives them once per frame.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crossterm::style::{Color, Stylize};
use tracing::{debug, warn};

use sequence_core::input::FrameClock;
use sequence_core::subscribers::{
    EffectTarget, FinalPoseReveal, FrameSubscriber, ImageTarget, ProgressImage, Rgba, RiddleImage,
    SequenceEffects, SequenceUi, SequenceUiTarget, SubscriberContext, TextTarget,
};

use crate::config::LensConfig;

const BAR_WIDTH: u8 = 20;

/// Image component that remembers its texture.
#[derive(Debug)]
pub struct TerminalImage {
    label: &'static str,
    texture: Option<String>,
}

impl TerminalImage {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            texture: None,
        }
    }

    #[must_use]
    pub fn texture(&self) -> Option<&str> {
        self.texture.as_deref()
    }
}

impl ImageTarget for TerminalImage {
    fn set_texture(&mut self, texture: &str) {
        debug!(image = self.label, texture, "set texture");
        self.texture = Some(texture.to_string());
    }
}

#[derive(Debug, Default)]
pub struct TerminalText {
    pub text: String,
    pub enabled: bool,
}

impl TextTarget for TerminalText {
    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

#[derive(Debug)]
pub struct TerminalHud {
    pub instruction: String,
    pub countdown: String,
    pub bar_visible: bool,
    pub fill: f32,
    pub color: Rgba,
}

impl Default for TerminalHud {
    fn default() -> Self {
        Self {
            instruction: String::new(),
            countdown: String::new(),
            bar_visible: false,
            fill: 0.0,
            color: Rgba::YELLOW,
        }
    }
}

impl TerminalHud {
    /// Renders the progress bar, coloured when `styled` is set.
    #[must_use]
    pub fn bar(&self, styled: bool) -> String {
        let filled = scale(self.fill, BAR_WIDTH);
        let mut bar = String::with_capacity(usize::from(BAR_WIDTH));
        for cell in 0..BAR_WIDTH {
            bar.push(if cell < filled { '#' } else { '.' });
        }
        let bar = if styled {
            bar.with(Color::Rgb {
                r: scale(self.color.r, u8::MAX),
                g: scale(self.color.g, u8::MAX),
                b: scale(self.color.b, u8::MAX),
            })
            .to_string()
        } else {
            bar
        };
        format!("[{bar}] {}%", scale(self.fill, 100))
    }
}

impl SequenceUiTarget for TerminalHud {
    fn set_instruction(&mut self, text: &str) {
        if self.instruction != text {
            debug!(text, "instruction");
            self.instruction = text.to_string();
        }
    }

    fn set_countdown(&mut self, text: &str) {
        text.clone_into(&mut self.countdown);
    }

    fn set_bar_visible(&mut self, visible: bool) {
        self.bar_visible = visible;
    }

    fn set_bar_fill(&mut self, fill: f32) {
        self.fill = fill;
    }

    fn set_bar_color(&mut self, color: Rgba) {
        self.color = color;
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GroupState {
    pub objects: bool,
    pub textures: bool,
    pub particles: bool,
    pub last_tween: Option<String>,
}

/// Effect groups keyed by name.
#[derive(Debug, Default)]
pub struct TerminalEffects {
    groups: BTreeMap<String, GroupState>,
}

impl TerminalEffects {
    fn group(&mut self, name: &str) -> &mut GroupState {
        self.groups.entry(name.to_string()).or_default()
    }

    /// Groups whose objects are currently enabled.
    #[must_use]
    pub fn visible(&self) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|(_, state)| state.objects)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl EffectTarget for TerminalEffects {
    fn set_objects_enabled(&mut self, group: &str, enabled: bool) {
        self.group(group).objects = enabled;
    }

    fn start_tweens(&mut self, group: &str, tween: &str) {
        debug!(group, tween, "tween");
        self.group(group).last_tween = Some(tween.to_string());
    }

    fn set_textures_playing(&mut self, group: &str, playing: bool) {
        self.group(group).textures = playing;
    }

    fn set_particles_active(&mut self, group: &str, active: bool) {
        self.group(group).particles = active;
    }
}

/// Every subscriber of the lens, drawn on terminal targets.
pub struct Scene {
    progress: Option<ProgressImage<TerminalImage>>,
    riddle: Option<RiddleImage<TerminalImage>>,
    effects: Option<SequenceEffects<TerminalEffects>>,
    reveal: FinalPoseReveal<TerminalText>,
    ui: SequenceUi<TerminalHud>,
}

impl Scene {
    /// Attaches the subscribers enabled in `config`.
    ///
    /// A subscriber whose settings are invalid or name a trigger outside the
    /// catalog is logged and left out; the rest of the scene still runs.
    #[must_use]
    pub fn attach(context: &SubscriberContext, config: &LensConfig) -> Self {
        let progress = config
            .progress_image
            .enabled
            .then(|| {
                ProgressImage::attach(
                    context,
                    config.progress_image.settings(),
                    TerminalImage::new("progress"),
                )
                .map_err(anyhow::Error::from)
            })
            .and_then(|attached| skip_on_error("progress image", attached));

        let riddle = config
            .riddle
            .enabled
            .then(|| {
                config.riddle.settings().and_then(|settings| {
                    RiddleImage::attach(context, settings, TerminalImage::new("riddle"))
                        .map_err(anyhow::Error::from)
                })
            })
            .and_then(|attached| skip_on_error("riddle image", attached));

        let effects = config
            .effects
            .enabled
            .then(|| {
                config.effects.settings().and_then(|settings| {
                    SequenceEffects::attach(context, settings, TerminalEffects::default())
                        .map_err(anyhow::Error::from)
                })
            })
            .and_then(|attached| skip_on_error("sequence effects", attached));

        Self {
            progress,
            riddle,
            effects,
            reveal: FinalPoseReveal::attach(
                context,
                config.final_reveal.settings(),
                TerminalText::default(),
            ),
            ui: SequenceUi::attach(context, config.ui.settings(), TerminalHud::default()),
        }
    }

    /// Runs every subscriber's per-frame hook.
    pub fn update(&self, clock: &dyn FrameClock) {
        if let Some(progress) = &self.progress {
            progress.update(clock);
        }
        if let Some(riddle) = &self.riddle {
            riddle.update(clock);
        }
        if let Some(effects) = &self.effects {
            effects.update(clock);
        }
        self.reveal.update(clock);
        self.ui.update(clock);
    }

    #[must_use]
    pub fn hud_instruction(&self) -> String {
        self.ui.target().instruction.clone()
    }

    #[must_use]
    pub fn final_number_shown(&self) -> bool {
        self.reveal.is_shown()
    }

    /// One line per scene element, for the `status` command.
    #[must_use]
    pub fn describe(&self, styled: bool) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(progress) = &self.progress {
            lines.push(format!(
                "progress-image texture={} completed={}",
                progress.target().texture().unwrap_or("none"),
                progress.completed_poses().len()
            ));
        }
        if let Some(riddle) = &self.riddle {
            lines.push(format!(
                "riddle panel=\"{}\" texture={}",
                riddle.panel(),
                riddle.target().texture().unwrap_or("none")
            ));
        }
        if let Some(effects) = &self.effects {
            let mut line = String::from("effects visible=");
            let target = effects.target();
            let visible = target.visible();
            if visible.is_empty() {
                line.push_str("none");
            } else {
                line.push_str(&visible.join(","));
            }
            let _ = write!(
                line,
                " completion={} pending={}",
                if effects.completion_active() { "on" } else { "off" },
                effects.pending_timers()
            );
            lines.push(line);
        }

        let reveal = self.reveal.target();
        lines.push(if reveal.enabled {
            format!("final-number shown text={}", reveal.text)
        } else {
            String::from("final-number hidden")
        });

        let hud = self.ui.target();
        let mut line = format!("hud instruction=\"{}\"", hud.instruction);
        if !hud.countdown.is_empty() {
            let _ = write!(line, " countdown={}", hud.countdown);
        }
        lines.push(line);
        if hud.bar_visible {
            lines.push(format!("hud bar {}", hud.bar(styled)));
        }

        lines
    }
}

fn skip_on_error<T>(name: &str, attached: anyhow::Result<T>) -> Option<T> {
    match attached {
        Ok(subscriber) => Some(subscriber),
        Err(err) => {
            warn!(subscriber = name, error = %err, "subscriber disabled");
            None
        }
    }
}

/// Maps a fraction in `[0, 1]` onto `0..=max`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale(fraction: f32, max: u8) -> u8 {
    (fraction.clamp(0.0, 1.0) * f32::from(max)).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bar_reflects_fill() {
        let hud = TerminalHud {
            fill: 0.5,
            bar_visible: true,
            ..TerminalHud::default()
        };
        assert_eq!(hud.bar(false), "[##########..........] 50%");
    }

    #[test]
    fn overfilled_bar_is_clamped() {
        let hud = TerminalHud {
            fill: 1.7,
            ..TerminalHud::default()
        };
        assert_eq!(hud.bar(false), "[####################] 100%");
    }

    #[test]
    fn effects_track_visible_groups() {
        let mut effects = TerminalEffects::default();
        effects.set_objects_enabled("TPOSE", true);
        effects.set_objects_enabled("ARMS_UP", false);
        effects.start_tweens("TPOSE", "FADEIN");
        assert_eq!(effects.visible(), vec!["TPOSE"]);
        assert_eq!(
            effects.groups["TPOSE"].last_tween.as_deref(),
            Some("FADEIN")
        );
    }
}
