//! Audio sensing: loudness of the game's output captured from an input line

pub mod line;
pub mod monitor;
pub mod sensor;

pub use line::{list_input_devices, AudioLine, CpalLine, CpalOpener, LineOpener};
pub use monitor::{AudioEvent, AudioListener, AudioMonitor, MonitorState};
pub use sensor::{rms_level, AudioSensor};

/// Latest published loudness, polled by the engine
pub trait LevelSource: Send + Sync {
    fn current_level(&self) -> f64;
}
