//! Error types shared by the sensors, actuators and the bot engine

use thiserror::Error;

/// Failures of the audio capture surface
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio input device available")]
    NoDevice,

    #[error("audio input device '{0}' not found")]
    DeviceNotFound(String),

    #[error("audio device does not support 16-bit mono capture: {0}")]
    UnsupportedFormat(String),

    #[error("failed to open audio stream: {0}")]
    Stream(String),

    #[error("audio read failed: {0}")]
    Read(String),

    #[error("audio device can only be changed while the monitor is stopped")]
    Busy,
}

/// Failures of the screen capture surface
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no screens found")]
    NoScreens,

    #[error("screen index {0} is out of range")]
    InvalidScreen(usize),

    #[error("capture region {width}x{height} is empty")]
    EmptyRegion { width: u32, height: u32 },

    #[error("screen capture failed: {0}")]
    Capture(String),
}

/// Failures of the synthetic input surface
#[derive(Debug, Error)]
pub enum InputError {
    #[error("input injection is not supported on this platform")]
    Unsupported,

    #[error("input injection failed: {0}")]
    Injection(String),
}

/// Failures loading or saving settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Anything that can end a bot run with `StopReason::Error`
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("unexpected failure: {0}")]
    Panic(String),
}
