//! Terminal emulator for the pose sequence lens.
//!
//! Wires a [`sequence_core`] controller and its subscribers to recording
//! scene targets, and drives them from a line-oriented session where the
//! host plays the tracked body and the frame clock.

pub mod config;
pub mod scene;
pub mod session;

pub use config::LensConfig;
pub use session::{Session, SessionOptions};
