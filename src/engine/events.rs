//! Status events pushed by the engine to its observer

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::screen_reader::Point;

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    /// Stop button or stop hotkey
    #[default]
    Manual,
    /// Addon reported full bags
    InventoryFull,
    /// Configured run time elapsed
    TimeLimit,
    /// A sensor or actuator failed mid-run
    Error,
}

impl StopReason {
    pub fn value(&self) -> &'static str {
        match self {
            StopReason::Manual => "Manual",
            StopReason::InventoryFull => "Bags Full",
            StopReason::TimeLimit => "Time Limit",
            StopReason::Error => "Error",
        }
    }

    /// True for stops the user asked for or configured
    pub fn is_intentional(&self) -> bool {
        !matches!(self, StopReason::Error)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Everything the engine reports while running
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    Starting,
    Countdown(u8),
    ApplyingLure,
    BagsFull,
    TimeLimitReached,
    LoggingOut,
    Casting,
    CastFailed,
    SearchingBobber,
    BobberNotFound,
    BobberFound(Point),
    /// Request to flash a marker where the bobber was detected
    Marker(Point),
    Listening,
    SplashDetected { level: f64 },
    /// Trigger window elapsed or the cast was cancelled externally
    Timeout,
    Caught,
    TooFar,
    Looting,
    Error(String),
    Stopped(StopReason),
}

impl fmt::Display for BotEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotEvent::Starting => write!(f, "Starting..."),
            BotEvent::Countdown(n) => write!(f, "Starting in {}...", n),
            BotEvent::ApplyingLure => write!(f, "Applying Lure..."),
            BotEvent::BagsFull => write!(f, "Bags Full"),
            BotEvent::TimeLimitReached => write!(f, "Time Limit Reached"),
            BotEvent::LoggingOut => write!(f, "Logging out..."),
            BotEvent::Casting => write!(f, "Casting..."),
            BotEvent::CastFailed => write!(f, "Cast Failed"),
            BotEvent::SearchingBobber => write!(f, "Searching for bobber..."),
            BotEvent::BobberNotFound => write!(f, "Bobber not found - Recasting"),
            BotEvent::BobberFound(p) => write!(f, "Bobber found at ({}, {})", p.x, p.y),
            BotEvent::Marker(p) => write!(f, "Marker at ({}, {})", p.x, p.y),
            BotEvent::Listening => write!(f, "Listening..."),
            BotEvent::SplashDetected { .. } => write!(f, "Splash Detected!"),
            BotEvent::Timeout => write!(f, "Timeout/Cancelled"),
            BotEvent::Caught => write!(f, "Caught Fish!"),
            BotEvent::TooFar => write!(f, "Too Far - Cancelling"),
            BotEvent::Looting => write!(f, "Looting..."),
            BotEvent::Error(msg) => write!(f, "Error: {}", msg),
            BotEvent::Stopped(_) => write!(f, "Stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(BotEvent::Countdown(2).to_string(), "Starting in 2...");
        assert_eq!(BotEvent::Caught.to_string(), "Caught Fish!");
        assert_eq!(BotEvent::Timeout.to_string(), "Timeout/Cancelled");
        assert_eq!(
            BotEvent::Error("capture failed".to_string()).to_string(),
            "Error: capture failed"
        );
        assert_eq!(BotEvent::Stopped(StopReason::TimeLimit).to_string(), "Stopped");
    }

    #[test]
    fn test_stop_reason() {
        assert!(StopReason::InventoryFull.is_intentional());
        assert!(!StopReason::Error.is_intentional());
        assert_eq!(StopReason::default(), StopReason::Manual);
        assert_eq!(
            serde_json::to_string(&StopReason::InventoryFull).unwrap(),
            "\"INVENTORY_FULL\""
        );
    }
}
