//! permit CLI Library
//!
//! A simulated device that walks runtime permissions through the same
//! lifecycle as a phone, driven by terminal prompts.

pub mod commands;
pub mod device;
pub mod prompt;
pub mod session;
pub mod terminal;
