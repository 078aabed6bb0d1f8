//! # Sen Music
//!
//! Discord music bot for SoundCloud tracks and sets, driven by `sen!` text
//! commands. The interesting part is the per-guild queue engine in
//! [`audio`]; [`bot`] is the serenity glue around it.

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod ui;
