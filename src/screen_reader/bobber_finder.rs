//! Locates the bobber by its red float inside the search area

use std::sync::Arc;

use image::RgbaImage;

use super::screen_service::{Point, Region, ScreenCapture};
use crate::error::CaptureError;

/// Pixels are sampled on every other row and column
const SCAN_STRIDE: usize = 2;

/// A pixel only counts as red when it beats both other channels by this factor
const DOMINANCE: f64 = 1.5;

/// Search area used when no ROI is configured: half the screen width, 40% of
/// its height, centered and raised by 5% of the height.
pub fn default_roi(screen: Region) -> Region {
    let sw = screen.width as f64;
    let sh = screen.height as f64;
    let width = (sw * 0.5) as i32;
    let height = (sh * 0.4) as i32;
    let x = screen.left + (screen.width as i32 - width) / 2;
    let y = screen.top + (screen.height as i32 - height) / 2 - (sh * 0.05) as i32;
    Region::new(x, y, width as u32, height as u32)
}

/// Redness of one pixel, or `None` when it is not red-dominant
pub fn redness(r: u8, g: u8, b: u8) -> Option<f64> {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    if r > 0.0 && r > g * DOMINANCE && r > b * DOMINANCE {
        Some(r - (g + b) / 2.0)
    } else {
        None
    }
}

/// Reddest pixel of `image` with its score, in absolute coordinates.
///
/// Ties keep the first pixel in scan order (column by column).
pub fn scan(image: &RgbaImage, origin: Point) -> Option<(Point, f64)> {
    let mut best: Option<(Point, f64)> = None;

    for x in (0..image.width()).step_by(SCAN_STRIDE) {
        for y in (0..image.height()).step_by(SCAN_STRIDE) {
            let p = image.get_pixel(x, y);
            let Some(score) = redness(p[0], p[1], p[2]) else {
                continue;
            };
            if best.map_or(true, |(_, max)| score > max) {
                best = Some((Point::new(origin.x + x as i32, origin.y + y as i32), score));
            }
        }
    }

    best
}

/// Captures the search area and returns the most bobber-like pixel
pub struct BobberFinder {
    screen: Arc<dyn ScreenCapture>,
}

impl BobberFinder {
    pub fn new(screen: Arc<dyn ScreenCapture>) -> Self {
        Self { screen }
    }

    /// Search area for this cycle: the configured ROI, else the default area
    /// of the selected monitor (monitor 0 when the index is out of range)
    pub fn search_area(
        &self,
        roi: Option<Region>,
        screen_index: usize,
    ) -> Result<Region, CaptureError> {
        if let Some(roi) = roi {
            return Ok(roi);
        }
        let bounds = match self.screen.screen_bounds(screen_index) {
            Ok(b) => b,
            Err(CaptureError::InvalidScreen(_)) => self.screen.screen_bounds(0)?,
            Err(e) => return Err(e),
        };
        Ok(default_roi(bounds))
    }

    pub fn find_bobber(
        &self,
        roi: Option<Region>,
        screen_index: usize,
    ) -> Result<Option<Point>, CaptureError> {
        let area = self.search_area(roi, screen_index)?;
        tracing::debug!("[FINDER] Capturing ROI: {:?}", area);

        let image = self.screen.capture(area)?;
        match scan(&image, Point::new(area.left, area.top)) {
            Some((point, score)) => {
                tracing::debug!(
                    "[FINDER] Bobber candidate at ({}, {}) with redness {:.1}",
                    point.x,
                    point.y,
                    score
                );
                Ok(Some(point))
            }
            None => {
                tracing::debug!("[FINDER] No bobber candidate found");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn canvas(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([40, 60, 80, 255]))
    }

    #[test]
    fn test_redness_eligibility() {
        assert_eq!(redness(0, 0, 0), None);
        assert_eq!(redness(150, 100, 0), None); // 150 is exactly 1.5 * 100
        assert_eq!(redness(151, 100, 0), Some(101.0));
        assert_eq!(redness(255, 0, 0), Some(255.0));
    }

    #[test]
    fn test_single_red_pixel_found_in_absolute_coordinates() {
        let mut img = canvas(100, 80);
        img.put_pixel(42, 18, Rgba([220, 30, 30, 255]));
        let (point, score) = scan(&img, Point::new(-1500, 300)).unwrap();
        assert_eq!(point, Point::new(-1458, 318));
        assert_eq!(score, 190.0);
    }

    #[test]
    fn test_no_eligible_pixel() {
        let img = canvas(64, 64);
        assert!(scan(&img, Point::new(0, 0)).is_none());
    }

    #[test]
    fn test_strongest_redness_wins() {
        let mut img = canvas(50, 50);
        img.put_pixel(2, 2, Rgba([200, 100, 100, 255]));
        img.put_pixel(10, 40, Rgba([250, 20, 10, 255]));
        img.put_pixel(30, 6, Rgba([180, 10, 10, 255]));
        let (point, _) = scan(&img, Point::new(0, 0)).unwrap();
        assert_eq!(point, Point::new(10, 40));
    }

    #[test]
    fn test_tie_keeps_first_in_scan_order() {
        let mut img = canvas(20, 20);
        img.put_pixel(8, 2, Rgba([200, 0, 0, 255]));
        img.put_pixel(4, 12, Rgba([200, 0, 0, 255]));
        let (point, _) = scan(&img, Point::new(0, 0)).unwrap();
        assert_eq!(point, Point::new(4, 12));
    }

    #[test]
    fn test_odd_pixels_are_skipped() {
        let mut img = canvas(20, 20);
        img.put_pixel(3, 4, Rgba([255, 0, 0, 255]));
        assert!(scan(&img, Point::new(0, 0)).is_none());
    }

    #[test]
    fn test_default_roi_on_primary_1080p() {
        let roi = default_roi(Region::new(0, 0, 1920, 1080));
        assert_eq!(roi, Region::new(480, 270, 960, 432));
    }

    #[test]
    fn test_default_roi_on_offset_monitor() {
        let roi = default_roi(Region::new(1920, -200, 2560, 1440));
        assert_eq!(roi, Region::new(1920 + 640, -200 + 432 - 72, 1280, 576));
    }
}
