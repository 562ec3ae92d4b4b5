//! Physical stop-key polling on its own thread

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::input::InputBackend;
use crate::utils::keybinds::key_name;

/// Cadence of the key-state poll
pub const STOP_KEY_POLL: Duration = Duration::from_millis(100);

/// Poll `scan_code` until it is pressed or `active` turns false.
///
/// `on_press` runs at most once, on the watcher thread.
pub fn spawn_stop_key_watcher(
    input: Arc<dyn InputBackend>,
    scan_code: u16,
    active: impl Fn() -> bool + Send + 'static,
    on_press: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stop-key-listener".to_string())
        .spawn(move || {
            tracing::debug!("[ENGINE] Stop key listener watching {}", key_name(scan_code));
            while active() {
                if input.is_key_pressed(scan_code) {
                    tracing::info!("[ENGINE] Stop key pressed, stopping bot");
                    on_press();
                    break;
                }
                thread::sleep(STOP_KEY_POLL);
            }
            tracing::debug!("[ENGINE] Stop key listener finished");
        })
}
