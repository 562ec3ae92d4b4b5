//! One-pixel status channel rendered by the in-game addon
//!
//! The addon paints a single pixel at the origin of the game monitor. Red
//! and green are binary flags; blue carries three levels: idle heartbeat
//! (~102), too far (~191) and caught (255).

use std::sync::Arc;

use super::screen_service::ScreenCapture;
use crate::error::CaptureError;

/// Raw color snapshot of the status pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSignal {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl StatusSignal {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub fn is_bags_full(&self) -> bool {
        self.red > 200
    }

    pub fn is_fishing(&self) -> bool {
        self.green > 200
    }

    pub fn is_caught(&self) -> bool {
        self.blue > 230
    }

    pub fn is_too_far(&self) -> bool {
        self.blue > 170 && self.blue < 210
    }

    pub fn is_addon_detected(&self) -> bool {
        self.blue > 80
    }
}

/// Samples the status pixel on demand
pub struct PixelBridge {
    screen: Arc<dyn ScreenCapture>,
    offset_x: i32,
    offset_y: i32,
}

impl PixelBridge {
    pub fn new(screen: Arc<dyn ScreenCapture>) -> Self {
        Self {
            screen,
            offset_x: 0,
            offset_y: 0,
        }
    }

    /// Absolute coordinate of the status pixel
    pub fn set_offset(&mut self, x: i32, y: i32) {
        self.offset_x = x;
        self.offset_y = y;
    }

    pub fn offset(&self) -> (i32, i32) {
        (self.offset_x, self.offset_y)
    }

    /// Read the current pixel; no smoothing across samples
    pub fn sample(&self) -> Result<StatusSignal, CaptureError> {
        let px = self.screen.pixel(self.offset_x, self.offset_y)?;
        let signal = StatusSignal::new(px[0], px[1], px[2]);
        tracing::trace!(
            "[BRIDGE] rgb=({}, {}, {}) fishing={} caught={} too_far={}",
            signal.red,
            signal.green,
            signal.blue,
            signal.is_fishing(),
            signal.is_caught(),
            signal.is_too_far()
        );
        Ok(signal)
    }
}
