//! Fisherman - audio and pixel driven auto fishing bot
//!
//! Watches a one-pixel status channel painted by an in-game addon, finds the
//! bobber by its red tint, listens for the splash on an audio input line and
//! answers with humanized keyboard and pointer input.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod log_main;
pub mod screen_reader;
pub mod utils;

// Re-exports for convenience
pub use audio::{AudioMonitor, LevelSource};
pub use config::{Settings, SettingsStore};
pub use engine::{BotEngine, BotEvent, Platform, Session, StopReason};
pub use error::{AudioError, CaptureError, ConfigError, EngineError, InputError};
pub use input::{Actuator, InputBackend, NativeInput};
pub use screen_reader::{BobberFinder, PixelBridge, Point, Region, ScreenCapture, ScreenService};
pub use utils::{keybinds, path::get_data_dir, Humanizer};
