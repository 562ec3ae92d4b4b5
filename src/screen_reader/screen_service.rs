//! Screen capture capability and its `screenshots` backend
//!
//! Coordinates are absolute virtual-desktop coordinates, so a secondary
//! monitor left of the primary one has negative `left` values.

use image::{Rgb, RgbaImage};
use screenshots::Screen;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// Rectangle on the virtual desktop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self { left, top, width, height }
    }

    /// Create from corner coordinates (x1, y1, x2, y2)
    pub fn from_rect(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            left: x1,
            top: y1,
            width: (x2 - x1).max(0) as u32,
            height: (y2 - y1).max(0) as u32,
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left
            && y >= self.top
            && (x as i64) < self.left as i64 + self.width as i64
            && (y as i64) < self.top as i64 + self.height as i64
    }
}

/// Absolute screen coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        let dx = (other.x - self.x) as f64;
        let dy = (other.y - self.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Read access to the screen, one implementation per platform
pub trait ScreenCapture: Send + Sync {
    /// Bounds of the monitor at `index`
    fn screen_bounds(&self, index: usize) -> Result<Region, CaptureError>;

    /// Capture a rectangle in one grab
    fn capture(&self, region: Region) -> Result<RgbaImage, CaptureError>;

    /// Color of a single pixel
    fn pixel(&self, x: i32, y: i32) -> Result<Rgb<u8>, CaptureError> {
        let img = self.capture(Region::new(x, y, 1, 1))?;
        let p = img.get_pixel(0, 0);
        Ok(Rgb([p[0], p[1], p[2]]))
    }
}

/// Capture backend built on the `screenshots` crate
#[derive(Debug, Default)]
pub struct ScreenService;

impl ScreenService {
    pub fn new() -> Self {
        Self
    }

    fn screens() -> Result<Vec<Screen>, CaptureError> {
        let screens = Screen::all().map_err(|e| CaptureError::Capture(e.to_string()))?;
        if screens.is_empty() {
            return Err(CaptureError::NoScreens);
        }
        Ok(screens)
    }

    fn bounds_of(screen: &Screen) -> Region {
        let info = &screen.display_info;
        Region::new(info.x, info.y, info.width, info.height)
    }
}

impl ScreenCapture for ScreenService {
    fn screen_bounds(&self, index: usize) -> Result<Region, CaptureError> {
        let screens = Self::screens()?;
        screens
            .get(index)
            .map(Self::bounds_of)
            .ok_or(CaptureError::InvalidScreen(index))
    }

    fn capture(&self, region: Region) -> Result<RgbaImage, CaptureError> {
        if region.width == 0 || region.height == 0 {
            return Err(CaptureError::EmptyRegion {
                width: region.width,
                height: region.height,
            });
        }

        let screen = Screen::from_point(region.left, region.top)
            .map_err(|e| CaptureError::Capture(e.to_string()))?;
        let bounds = Self::bounds_of(&screen);

        // capture_area takes coordinates relative to the owning monitor
        let image = screen
            .capture_area(
                region.left - bounds.left,
                region.top - bounds.top,
                region.width,
                region.height,
            )
            .map_err(|e| CaptureError::Capture(e.to_string()))?;

        RgbaImage::from_raw(image.width(), image.height(), image.to_vec()).ok_or_else(|| {
            CaptureError::Capture("captured buffer does not match its dimensions".to_string())
        })
    }
}
