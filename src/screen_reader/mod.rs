//! Screen sensing: capture backend, addon status pixel and bobber search

pub mod bobber_finder;
pub mod pixel_bridge;
pub mod screen_service;

pub use bobber_finder::{default_roi, BobberFinder};
pub use pixel_bridge::{PixelBridge, StatusSignal};
pub use screen_service::{Point, Region, ScreenCapture, ScreenService};
