//! Rendering surfaces the subscribers draw on.
//!
//! Calls are fire-and-forget; the lens runtime (or the emulator) decides what
//! a texture name or an effect group means.

/// Linear RGBA colour.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const YELLOW: Self = Self::new(1.0, 1.0, 0.0, 1.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

pub trait ImageTarget {
    fn set_texture(&mut self, texture: &str);
}

pub trait TextTarget {
    fn set_text(&mut self, text: &str);
    fn set_enabled(&mut self, enabled: bool);
}

/// Instruction text, countdown text and progress bar of the sequence HUD.
pub trait SequenceUiTarget {
    fn set_instruction(&mut self, text: &str);
    fn set_countdown(&mut self, text: &str);
    fn set_bar_visible(&mut self, visible: bool);
    /// Fill fraction in `[0, 1]`.
    fn set_bar_fill(&mut self, fill: f32);
    fn set_bar_color(&mut self, color: Rgba);
}

/// Scene objects, tweens, animated textures and particles of effect groups.
pub trait EffectTarget {
    fn set_objects_enabled(&mut self, group: &str, enabled: bool);
    fn start_tweens(&mut self, group: &str, tween: &str);
    fn set_textures_playing(&mut self, group: &str, playing: bool);
    fn set_particles_active(&mut self, group: &str, active: bool);
}
