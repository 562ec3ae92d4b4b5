//! Bot engine: the fishing state machine and everything it drives

pub mod bot_engine;
pub mod clock;
pub mod events;
pub mod hotkey;
pub mod session;

use std::sync::Arc;

use crate::audio::LevelSource;
use crate::input::InputBackend;
use crate::screen_reader::ScreenCapture;
use crate::utils::Humanizer;

pub use bot_engine::{BotEngine, StatusObserver, StopHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{BotEvent, StopReason};
pub use session::{format_duration, Session};

/// Sensors, actuators and time source the engine runs against
#[derive(Clone)]
pub struct Platform {
    pub screen: Arc<dyn ScreenCapture>,
    pub input: Arc<dyn InputBackend>,
    pub levels: Arc<dyn LevelSource>,
    pub clock: Arc<dyn Clock>,
    pub humanizer: Arc<Humanizer>,
}
