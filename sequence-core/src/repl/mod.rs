//! REPL tooling shared by lens hosts and the terminal emulator.
//!
//! The REPL grammar lives in [`grammar`] and is implemented with a
//! token/parse pipeline that stays compatible with `no_std`.

pub mod catalog;
pub mod grammar;
pub mod status;
