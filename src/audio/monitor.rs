//! Background sampling loop publishing the latest loudness
//!
//! The monitor owns its input line for the whole sampling run and always
//! closes it on the way out, including when opening or reading fails.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use super::line::{CpalOpener, LineOpener};
use super::sensor::AudioSensor;
use super::LevelSource;
use crate::error::AudioError;

/// Lifecycle of the sampling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Starting,
    Sampling,
}

/// Pushed to the listener for every sample, or once when sampling fails
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    Level(f64),
    Error(String),
}

pub type AudioListener = Arc<dyn Fn(AudioEvent) + Send + Sync>;

struct Shared {
    monitoring: AtomicBool,
    level_bits: AtomicU64,
    state: Mutex<MonitorState>,
    listener: Option<AudioListener>,
}

impl Shared {
    fn publish(&self, event: AudioEvent) {
        if let Some(listener) = &self.listener {
            listener(event);
        }
    }
}

pub struct AudioMonitor {
    shared: Arc<Shared>,
    opener: Arc<dyn LineOpener>,
    device: Mutex<Option<String>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AudioMonitor {
    /// Monitor reading from the host's capture devices
    pub fn new(listener: Option<AudioListener>) -> Self {
        Self::with_opener(Arc::new(CpalOpener), listener)
    }

    pub fn with_opener(opener: Arc<dyn LineOpener>, listener: Option<AudioListener>) -> Self {
        Self {
            shared: Arc::new(Shared {
                monitoring: AtomicBool::new(false),
                level_bits: AtomicU64::new(0f64.to_bits()),
                state: Mutex::new(MonitorState::Stopped),
                listener,
            }),
            opener,
            device: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> MonitorState {
        *self.shared.state.lock()
    }

    /// Select the capture device; `None` is the system default
    pub fn set_device(&self, name: Option<String>) -> Result<(), AudioError> {
        if self.state() != MonitorState::Stopped {
            return Err(AudioError::Busy);
        }
        *self.device.lock() = name;
        Ok(())
    }

    /// Spawn the sampling loop; no-op while it is already running
    pub fn start(&self) {
        {
            let mut state = self.shared.state.lock();
            if *state != MonitorState::Stopped {
                return;
            }
            *state = MonitorState::Starting;
            // set under the lock; a stop() seen while Starting must stick
            self.shared.monitoring.store(true, Ordering::SeqCst);
        }
        // a previous loop that stopped on its own still needs reaping
        if let Some(old) = self.handle.lock().take() {
            let _ = old.join();
        }

        let shared = self.shared.clone();
        let opener = self.opener.clone();
        let device = self.device.lock().clone();

        let spawned = thread::Builder::new()
            .name("audio-monitor".to_string())
            .spawn(move || sample_loop(shared, opener, device));

        match spawned {
            Ok(handle) => *self.handle.lock() = Some(handle),
            Err(e) => {
                self.shared.monitoring.store(false, Ordering::SeqCst);
                *self.shared.state.lock() = MonitorState::Stopped;
                self.shared.publish(AudioEvent::Error(e.to_string()));
            }
        }
    }

    /// Ask the loop to finish and wait for it to release the line.
    ///
    /// Safe to call repeatedly and from any thread, including from the
    /// listener (in which case it does not wait).
    pub fn stop(&self) {
        self.shared.monitoring.store(false, Ordering::SeqCst);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::warn!("[AUDIO] Sampling thread panicked");
                *self.shared.state.lock() = MonitorState::Stopped;
            }
        }
    }

    pub fn current_level(&self) -> f64 {
        f64::from_bits(self.shared.level_bits.load(Ordering::Acquire))
    }
}

impl LevelSource for AudioMonitor {
    fn current_level(&self) -> f64 {
        AudioMonitor::current_level(self)
    }
}

impl Drop for AudioMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sample_loop(shared: Arc<Shared>, opener: Arc<dyn LineOpener>, device: Option<String>) {
    let mut line = match opener.open(device.as_deref()) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!("[AUDIO] Could not open input line: {}", e);
            shared.level_bits.store(0f64.to_bits(), Ordering::Release);
            shared.monitoring.store(false, Ordering::SeqCst);
            *shared.state.lock() = MonitorState::Stopped;
            shared.publish(AudioEvent::Error(e.to_string()));
            return;
        }
    };

    *shared.state.lock() = MonitorState::Sampling;
    tracing::info!("[AUDIO] Sampling started");

    let mut sensor = AudioSensor::new();
    let mut failure = None;
    while shared.monitoring.load(Ordering::SeqCst) {
        match sensor.read_level(line.as_mut()) {
            Ok(level) => {
                shared.level_bits.store(level.to_bits(), Ordering::Release);
                tracing::trace!("[AUDIO] level={:.3}", level);
                shared.publish(AudioEvent::Level(level));
            }
            Err(e) => {
                if shared.monitoring.load(Ordering::SeqCst) {
                    failure = Some(e);
                }
                break;
            }
        }
    }

    line.close();
    // a dead monitor reads as silence
    shared.level_bits.store(0f64.to_bits(), Ordering::Release);
    shared.monitoring.store(false, Ordering::SeqCst);
    *shared.state.lock() = MonitorState::Stopped;

    match failure {
        Some(e) => {
            tracing::warn!("[AUDIO] Sampling stopped after read failure: {}", e);
            shared.publish(AudioEvent::Error(e.to_string()));
        }
        None => tracing::info!("[AUDIO] Sampling stopped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::line::AudioLine;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    struct ToneLine {
        sample: i16,
        reads_before_error: Option<usize>,
        closed: Arc<AtomicBool>,
    }

    impl AudioLine for ToneLine {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError> {
            if let Some(left) = self.reads_before_error.as_mut() {
                if *left == 0 {
                    return Err(AudioError::Read("device unplugged".to_string()));
                }
                *left -= 1;
            }
            thread::sleep(Duration::from_millis(2));
            for pair in buf[..64].chunks_exact_mut(2) {
                pair.copy_from_slice(&self.sample.to_le_bytes());
            }
            Ok(64)
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct ToneOpener {
        reads_before_error: Option<usize>,
        fail_open: bool,
        opened: AtomicUsize,
        last_device: Mutex<Option<String>>,
        closed: Arc<AtomicBool>,
    }

    impl ToneOpener {
        fn new(reads_before_error: Option<usize>, fail_open: bool) -> Arc<Self> {
            Arc::new(Self {
                reads_before_error,
                fail_open,
                opened: AtomicUsize::new(0),
                last_device: Mutex::new(None),
                closed: Arc::new(AtomicBool::new(false)),
            })
        }
    }

    impl LineOpener for ToneOpener {
        fn open(&self, device: Option<&str>) -> Result<Box<dyn AudioLine>, AudioError> {
            *self.last_device.lock() = device.map(str::to_string);
            if self.fail_open {
                return Err(AudioError::NoDevice);
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ToneLine {
                sample: 16384,
                reads_before_error: self.reads_before_error,
                closed: self.closed.clone(),
            }))
        }
    }

    fn collecting_listener() -> (AudioListener, Arc<Mutex<Vec<AudioEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        (Arc::new(move |e| sink.lock().push(e)), events)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_publishes_latest_level_and_stops() {
        let opener = ToneOpener::new(None, false);
        let (listener, events) = collecting_listener();
        let monitor = AudioMonitor::with_opener(opener.clone(), Some(listener));

        monitor.start();
        monitor.start();
        wait_until(|| monitor.current_level() > 0.0);
        assert!((monitor.current_level() - 50.0).abs() < 1e-9);
        assert_eq!(monitor.state(), MonitorState::Sampling);

        monitor.stop();
        monitor.stop();
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert!(opener.closed.load(Ordering::SeqCst));
        assert_eq!(opener.opened.load(Ordering::SeqCst), 1);
        assert!(events
            .lock()
            .iter()
            .all(|e| matches!(e, AudioEvent::Level(l) if (*l - 50.0).abs() < 1e-9)));
    }

    #[test]
    fn test_read_failure_reports_error_and_closes_line() {
        let opener = ToneOpener::new(Some(3), false);
        let (listener, events) = collecting_listener();
        let monitor = AudioMonitor::with_opener(opener.clone(), Some(listener));

        monitor.start();
        wait_until(|| matches!(events.lock().last(), Some(AudioEvent::Error(_))));
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert!(opener.closed.load(Ordering::SeqCst));

        let events = events.lock();
        assert_eq!(events.iter().filter(|e| matches!(e, AudioEvent::Level(_))).count(), 3);
        assert!(matches!(events.last(), Some(AudioEvent::Error(m)) if m.contains("unplugged")));
    }

    #[test]
    fn test_level_drops_to_silence_after_failure() {
        let opener = ToneOpener::new(Some(3), false);
        let (listener, events) = collecting_listener();
        let monitor = AudioMonitor::with_opener(opener, Some(listener));

        monitor.start();
        wait_until(|| matches!(events.lock().last(), Some(AudioEvent::Error(_))));
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert!(events
            .lock()
            .iter()
            .any(|e| matches!(e, AudioEvent::Level(l) if *l > 0.15)));
        assert_eq!(monitor.current_level(), 0.0);
    }

    #[test]
    fn test_level_drops_to_silence_after_stop() {
        let opener = ToneOpener::new(None, false);
        let monitor = AudioMonitor::with_opener(opener, None);

        monitor.start();
        wait_until(|| monitor.current_level() > 0.0);
        monitor.stop();
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(monitor.current_level(), 0.0);
    }

    #[test]
    fn test_stop_during_start_is_not_lost() {
        let opener = ToneOpener::new(Some(1), false);
        let blocked = Arc::new(AtomicBool::new(false));
        let gate = Arc::new(AtomicBool::new(false));
        let levels = Arc::new(AtomicUsize::new(0));

        let (on_block, on_gate, on_level) = (blocked.clone(), gate.clone(), levels.clone());
        let listener: AudioListener = Arc::new(move |event: AudioEvent| match event {
            AudioEvent::Level(_) => {
                on_level.fetch_add(1, Ordering::SeqCst);
            }
            // the first loop hangs in its error report until released
            AudioEvent::Error(_) => {
                if !on_block.swap(true, Ordering::SeqCst) {
                    while !on_gate.load(Ordering::SeqCst) {
                        thread::sleep(Duration::from_millis(1));
                    }
                }
            }
        });
        let monitor = Arc::new(AudioMonitor::with_opener(opener, Some(listener)));

        monitor.start();
        wait_until(|| blocked.load(Ordering::SeqCst));
        assert_eq!(levels.load(Ordering::SeqCst), 1);

        // restart parks in Starting while it reaps the first loop
        let restarter = {
            let monitor = monitor.clone();
            thread::spawn(move || monitor.start())
        };
        wait_until(|| monitor.state() == MonitorState::Starting);
        monitor.stop();
        gate.store(true, Ordering::SeqCst);
        restarter.join().unwrap();

        wait_until(|| monitor.state() == MonitorState::Stopped);
        monitor.stop();
        assert_eq!(levels.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.current_level(), 0.0);
    }

    #[test]
    fn test_open_failure_reports_error() {
        let opener = ToneOpener::new(None, true);
        let (listener, events) = collecting_listener();
        let monitor = AudioMonitor::with_opener(opener, Some(listener));

        monitor.start();
        wait_until(|| !events.lock().is_empty());
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert!(matches!(events.lock()[0], AudioEvent::Error(_)));
    }

    #[test]
    fn test_device_selection_requires_stopped_monitor() {
        let opener = ToneOpener::new(None, false);
        let monitor = AudioMonitor::with_opener(opener.clone(), None);

        monitor.set_device(Some("Line In".to_string())).unwrap();
        monitor.start();
        wait_until(|| monitor.state() == MonitorState::Sampling);
        assert!(matches!(monitor.set_device(None), Err(AudioError::Busy)));
        assert_eq!(opener.last_device.lock().as_deref(), Some("Line In"));

        monitor.stop();
        assert!(monitor.set_device(None).is_ok());
    }

    #[test]
    fn test_restart_after_stop() {
        let opener = ToneOpener::new(None, false);
        let monitor = AudioMonitor::with_opener(opener.clone(), None);
        monitor.start();
        wait_until(|| monitor.state() == MonitorState::Sampling);
        monitor.stop();
        monitor.start();
        wait_until(|| monitor.state() == MonitorState::Sampling);
        monitor.stop();
        assert_eq!(opener.opened.load(Ordering::SeqCst), 2);
    }
}
