//! Locations of the settings, logs and debug output

use std::env;
use std::path::PathBuf;

/// Folder holding `config/`, `logs/` and `debug/`.
///
/// A release build ships next to its `config` folder, so the executable's
/// directory wins when that folder exists; otherwise the working directory
/// is used (running from a checkout with `cargo run`).
pub fn get_data_dir() -> PathBuf {
    if let Ok(exe_path) = env::current_exe() {
        if let Some(parent) = exe_path.parent() {
            if parent.join("config").exists() {
                return parent.to_path_buf();
            }
        }
    }

    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// `<data>/config/settings.json`
pub fn settings_path() -> PathBuf {
    get_data_dir().join("config").join("settings.json")
}

/// `<data>/logs`
pub fn logs_dir() -> PathBuf {
    get_data_dir().join("logs")
}

/// `<data>/debug/log`
pub fn debug_log_dir() -> PathBuf {
    get_data_dir().join("debug").join("log")
}
