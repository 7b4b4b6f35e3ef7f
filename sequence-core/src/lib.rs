#![no_std]

extern crate alloc;

// Shared logic for the pose sequence lens.
//
// This crate stays portable across lens hosts and the terminal emulator by
// avoiding the Rust standard library. Hosts inject the trigger bus, the pose
// library, the tracking signal and the frame clock; everything else lives here.

pub mod controller;
pub mod input;
pub mod repl;
pub mod sequence;
pub mod subscribers;
pub mod timers;
pub mod triggers;
