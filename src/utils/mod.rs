//! Shared helpers: humanized randomness, key tables and data paths

pub mod humanizer;
pub mod keybinds;
pub mod path;

pub use humanizer::Humanizer;
