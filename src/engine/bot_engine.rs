//! Fishing control loop
//!
//! One worker thread runs the cast / locate / listen / react / confirm cycle
//! while a second thread watches the physical stop key. Every wait goes
//! through the engine [`Clock`] in slices of at most [`SLEEP_SLICE`], so a
//! stop request is honored within one slice even in the middle of a long
//! pause.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use super::clock::Clock;
use super::events::{BotEvent, StopReason};
use super::hotkey::spawn_stop_key_watcher;
use super::session::Session;
use super::Platform;
use crate::config::{Settings, SettingsStore};
use crate::error::EngineError;
use crate::input::Actuator;
use crate::screen_reader::{BobberFinder, PixelBridge, Point, Region, StatusSignal};
use crate::utils::keybinds::{scan_codes_for, SC_ENTER};

/// Longest uninterrupted wait
pub const SLEEP_SLICE: Duration = Duration::from_millis(100);

const COUNTDOWN_STEPS: u8 = 3;
const COUNTDOWN_STEP: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const CAST_CONFIRM_WINDOW: Duration = Duration::from_secs(2);
const SPLASH_WINDOW: Duration = Duration::from_secs(22);
/// Before this, a cleared fishing flag is the cast animation, not a cancel
const FISHING_GRACE: Duration = Duration::from_secs(1);
const LOOT_WINDOW: Duration = Duration::from_secs(3);
const LOGOUT_COMMAND: &str = "/logout";

pub type StatusObserver = Arc<dyn Fn(&BotEvent) + Send + Sync>;

/// State shared between the engine handle, the worker and the stop-key watcher
struct EngineShared {
    running: AtomicBool,
    /// Bumped on every start so a stale watcher can tell it is obsolete
    generation: AtomicU64,
    activity: RwLock<Option<BotEvent>>,
    session: Mutex<Session>,
    run_started: Mutex<Duration>,
    observer: Option<StatusObserver>,
}

impl EngineShared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_running() && self.generation.load(Ordering::SeqCst) == generation
    }

    fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn emit(&self, event: BotEvent) {
        match &event {
            BotEvent::Error(_) => tracing::error!("[ENGINE] {}", event),
            BotEvent::Marker(_) | BotEvent::BobberFound(_) => tracing::debug!("[ENGINE] {}", event),
            _ => tracing::info!("[ENGINE] {}", event),
        }
        *self.activity.write() = Some(event.clone());
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    fn set_stop_reason(&self, reason: StopReason) {
        self.session.lock().stop_reason = reason;
    }
}

/// Cloneable handle that can stop the engine from any thread
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<EngineShared>,
}

impl StopHandle {
    pub fn stop(&self) {
        if self.shared.is_running() {
            tracing::info!("[ENGINE] Stop requested");
        }
        self.shared.request_stop();
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }
}

pub struct BotEngine {
    settings: Arc<SettingsStore>,
    platform: Platform,
    shared: Arc<EngineShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BotEngine {
    pub fn new(
        settings: Arc<SettingsStore>,
        platform: Platform,
        observer: Option<StatusObserver>,
    ) -> Self {
        Self {
            settings,
            platform,
            shared: Arc::new(EngineShared {
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                activity: RwLock::new(None),
                session: Mutex::new(Session::begin()),
                run_started: Mutex::new(Duration::ZERO),
                observer,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Begin a run. Returns false when one is already in progress.
    ///
    /// Must not be called from the status observer.
    pub fn start(&self) -> Result<bool, EngineError> {
        let mut worker = self.worker.lock();
        if self.shared.is_running() {
            tracing::debug!("[ENGINE] Start ignored, already running");
            return Ok(false);
        }
        if let Some(previous) = worker.take() {
            if previous.thread().id() != thread::current().id() {
                let _ = previous.join();
            }
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.session.lock() = Session::begin();
        *self.shared.run_started.lock() = self.platform.clock.now();
        self.shared.running.store(true, Ordering::SeqCst);

        let settings = self.settings.snapshot();
        let watcher_shared = self.shared.clone();
        let stopper = self.shared.clone();
        if let Err(e) = spawn_stop_key_watcher(
            self.platform.input.clone(),
            settings.stop_key,
            move || watcher_shared.is_current(generation),
            move || stopper.request_stop(),
        ) {
            tracing::warn!("[ENGINE] Failed to start stop key listener: {}", e);
        }

        let mut cycle = Cycle::new(self.settings.clone(), self.platform.clone(), self.shared.clone());
        let spawned = thread::Builder::new()
            .name("bot-loop".to_string())
            .spawn(move || cycle.run());
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(true)
            }
            Err(e) => {
                self.shared.request_stop();
                Err(EngineError::Panic(format!("failed to spawn bot loop: {}", e)))
            }
        }
    }

    /// Request a stop; safe to call repeatedly
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: self.shared.clone(),
        }
    }

    /// Block until the current run has fully ended, then return its session
    pub fn join(&self) -> Session {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("[ENGINE] Bot loop thread panicked");
            }
        }
        self.session()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Latest status event
    pub fn activity(&self) -> Option<BotEvent> {
        self.shared.activity.read().clone()
    }

    /// Snapshot of the current or most recent run
    pub fn session(&self) -> Session {
        let mut session = self.shared.session.lock().clone();
        if session.stopped_at.is_none() {
            let elapsed = self
                .platform
                .clock
                .now()
                .saturating_sub(*self.shared.run_started.lock());
            session.duration_ms = elapsed.as_millis() as u64;
        }
        session
    }
}

impl Drop for BotEngine {
    fn drop(&mut self) {
        self.shared.request_stop();
    }
}

/// Worker-side state for one run
struct Cycle {
    settings: Arc<SettingsStore>,
    platform: Platform,
    shared: Arc<EngineShared>,
    actuator: Actuator,
    bridge: PixelBridge,
    finder: BobberFinder,
    started: Duration,
    last_lure: Option<Duration>,
}

impl Cycle {
    fn new(settings: Arc<SettingsStore>, platform: Platform, shared: Arc<EngineShared>) -> Self {
        let actuator = Actuator::new(
            platform.input.clone(),
            platform.humanizer.clone(),
            platform.clock.clone(),
        );
        let bridge = PixelBridge::new(platform.screen.clone());
        let finder = BobberFinder::new(platform.screen.clone());
        let started = platform.clock.now();
        Self {
            settings,
            platform,
            shared,
            actuator,
            bridge,
            finder,
            started,
            last_lure: None,
        }
    }

    fn run(&mut self) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.bot_loop()));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(panic_message(payload)),
        };

        if let Some(message) = failure {
            if self.running() {
                self.shared.set_stop_reason(StopReason::Error);
                self.shared.emit(BotEvent::Error(message));
            } else {
                tracing::debug!("[ENGINE] Ignoring failure after stop: {}", message);
            }
        }
        self.shared.request_stop();

        let reason = {
            let mut session = self.shared.session.lock();
            session.stopped_at = Some(Utc::now());
            session.duration_ms = self
                .platform
                .clock
                .now()
                .saturating_sub(self.started)
                .as_millis() as u64;
            tracing::info!(
                "[ENGINE] Run finished: {} throws, {} catches, reason {}",
                session.throws,
                session.catches,
                session.stop_reason
            );
            session.stop_reason
        };
        self.shared.emit(BotEvent::Stopped(reason));
    }

    fn bot_loop(&mut self) -> Result<(), EngineError> {
        let settings = self.settings.snapshot();
        let origin = self.screen_origin(settings.screen_index)?;
        self.bridge.set_offset(origin.left, origin.top);
        tracing::info!(
            "[ENGINE] Using screen {} with status pixel at ({}, {})",
            settings.screen_index,
            origin.left,
            origin.top
        );

        self.emit(BotEvent::Starting);
        for remaining in (1..=COUNTDOWN_STEPS).rev() {
            if !self.running() {
                return Ok(());
            }
            self.emit(BotEvent::Countdown(remaining));
            self.sleep_for(COUNTDOWN_STEP);
        }

        while self.running() {
            let settings = self.settings.snapshot();

            if self.time_limit_reached(&settings) {
                self.emit(BotEvent::TimeLimitReached);
                self.shared.set_stop_reason(StopReason::TimeLimit);
                self.logout()?;
                self.shared.request_stop();
                break;
            }

            self.apply_lure_if_due(&settings)?;
            if !self.running() {
                break;
            }

            let status = self.bridge.sample()?;
            if status.is_bags_full() {
                self.emit(BotEvent::BagsFull);
                self.shared.set_stop_reason(StopReason::InventoryFull);
                if settings.logout_after_full_bag {
                    self.logout()?;
                }
                self.shared.request_stop();
                break;
            }

            self.clear_stale_cast(&settings, status)?;
            if !self.running() {
                break;
            }

            let cast_at = self.cast(&settings)?;
            if !self.confirm_cast()? {
                if self.running() {
                    self.emit(BotEvent::CastFailed);
                    self.pause(1000.0, 500.0);
                }
                continue;
            }
            if !self.running() {
                break;
            }

            if self.locate_and_aim(&settings)?.is_none() {
                continue;
            }
            if !self.running() {
                break;
            }

            let hooked = self.wait_for_splash(&settings, cast_at)?;
            if !self.running() {
                break;
            }

            if hooked {
                self.react_and_confirm(&settings)?;
                if !self.running() {
                    break;
                }
                self.pause(2000.0, 500.0);
            } else {
                self.emit(BotEvent::Timeout);
                self.actuator.press(settings.cancel_key)?;
                self.pause(1000.0, 200.0);
            }
        }
        Ok(())
    }

    fn screen_origin(&self, index: usize) -> Result<Region, EngineError> {
        match self.platform.screen.screen_bounds(index) {
            Ok(bounds) => Ok(bounds),
            Err(crate::error::CaptureError::InvalidScreen(_)) => {
                tracing::warn!("[ENGINE] Screen {} not found, using primary", index);
                Ok(self.platform.screen.screen_bounds(0)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn time_limit_reached(&self, settings: &Settings) -> bool {
        if settings.run_time_limit == 0 {
            return false;
        }
        let limit = minutes(settings.run_time_limit);
        self.platform.clock.now().saturating_sub(self.started) >= limit
    }

    fn apply_lure_if_due(&mut self, settings: &Settings) -> Result<(), EngineError> {
        if !settings.lure_enabled {
            return Ok(());
        }
        let now = self.platform.clock.now();
        let interval = minutes(settings.lure_interval);
        let due = match self.last_lure {
            None => true,
            Some(at) => now.saturating_sub(at) >= interval,
        };
        if !due {
            return Ok(());
        }
        let Some(key) = settings.lure_key() else {
            tracing::debug!("[ENGINE] Lure enabled but no lure key bound");
            return Ok(());
        };

        self.emit(BotEvent::ApplyingLure);
        self.actuator.press(key)?;
        self.pause(7000.0, 500.0);
        self.last_lure = Some(self.platform.clock.now());
        Ok(())
    }

    fn clear_stale_cast(
        &self,
        settings: &Settings,
        status: StatusSignal,
    ) -> Result<(), EngineError> {
        if status.is_fishing() {
            tracing::debug!("[ENGINE] Still fishing from a previous cast, cancelling");
            self.actuator.press(settings.cancel_key)?;
            self.pause(800.0, 200.0);
        }
        Ok(())
    }

    /// Press the cast key and return the cast timestamp
    fn cast(&self, settings: &Settings) -> Result<Duration, EngineError> {
        self.emit(BotEvent::Casting);
        self.shared.session.lock().throws += 1;
        self.settings.increment_throws();
        self.actuator.press(settings.cast_key())?;
        Ok(self.platform.clock.now())
    }

    fn confirm_cast(&self) -> Result<bool, EngineError> {
        let clock = &self.platform.clock;
        let start = clock.now();
        while self.running() && clock.now().saturating_sub(start) < CAST_CONFIRM_WINDOW {
            if self.bridge.sample()?.is_fishing() {
                return Ok(true);
            }
            clock.sleep(POLL_INTERVAL);
        }
        Ok(false)
    }

    fn locate_and_aim(&self, settings: &Settings) -> Result<Option<Point>, EngineError> {
        self.emit(BotEvent::SearchingBobber);
        if !self.pause(1500.0, 250.0) {
            return Ok(None);
        }

        let Some(bobber) = self.finder.find_bobber(settings.roi, settings.screen_index)? else {
            self.emit(BotEvent::BobberNotFound);
            self.actuator.press(settings.cancel_key)?;
            self.pause(1000.0, 500.0);
            return Ok(None);
        };

        self.emit(BotEvent::BobberFound(bobber));
        if settings.show_detection_point {
            self.emit(BotEvent::Marker(bobber));
        }

        tracing::debug!("[ENGINE] Moving to bobber after ~{}ms", settings.reaction_time);
        if !self.pause(settings.reaction_time as f64, 75.0) {
            return Ok(Some(bobber));
        }

        // aim a little above the detected pixel
        let humanizer = &self.platform.humanizer;
        let target = Point::new(
            bobber.x + humanizer.jitter_int(0, 5),
            bobber.y - humanizer.jitter_int(10, 5),
        );
        self.actuator.move_to(target)?;
        Ok(Some(bobber))
    }

    /// True on splash; false on timeout or an externally cleared cast
    fn wait_for_splash(&self, settings: &Settings, cast_at: Duration) -> Result<bool, EngineError> {
        self.emit(BotEvent::Listening);
        let clock = &self.platform.clock;
        while self.running() && clock.now().saturating_sub(cast_at) < SPLASH_WINDOW {
            let level = self.platform.levels.current_level();
            if level > settings.splash_threshold {
                self.emit(BotEvent::SplashDetected { level });
                return Ok(true);
            }
            if clock.now().saturating_sub(cast_at) > FISHING_GRACE
                && !self.bridge.sample()?.is_fishing()
            {
                tracing::debug!("[ENGINE] Fishing flag cleared while listening");
                return Ok(false);
            }
            clock.sleep(self.platform.humanizer.delay(60.0, 15.0));
        }
        Ok(false)
    }

    fn react_and_confirm(&self, settings: &Settings) -> Result<(), EngineError> {
        let click_delay = self.platform.humanizer.uniform_int(200, 500);
        tracing::debug!("[ENGINE] Reacting in ~{}ms", click_delay);
        if !self.pause(click_delay as f64, 50.0) {
            return Ok(());
        }
        self.actuator.press(settings.interact_key)?;

        let clock = &self.platform.clock;
        let start = clock.now();
        let mut caught = false;
        let mut too_far = false;
        while self.running() && clock.now().saturating_sub(start) < LOOT_WINDOW {
            let status = self.bridge.sample()?;
            if status.is_caught() {
                caught = true;
                break;
            }
            if status.is_too_far() {
                too_far = true;
                break;
            }
            clock.sleep(POLL_INTERVAL);
        }

        if caught {
            self.shared.session.lock().catches += 1;
            self.settings.increment_fish_caught();
            self.emit(BotEvent::Caught);
        } else if self.running() {
            if too_far || self.bridge.sample()?.is_fishing() {
                self.emit(BotEvent::TooFar);
                self.actuator.press(settings.cancel_key)?;
                self.pause(500.0, 100.0);
            } else {
                self.emit(BotEvent::Looting);
            }
        }
        Ok(())
    }

    fn logout(&self) -> Result<(), EngineError> {
        self.emit(BotEvent::LoggingOut);
        self.pause(1000.0, 500.0);
        self.actuator.press(SC_ENTER)?;
        self.pause(200.0, 50.0);
        self.actuator.type_keys(&scan_codes_for(LOGOUT_COMMAND))?;
        self.pause(200.0, 50.0);
        self.actuator.press(SC_ENTER)?;
        self.pause(2000.0, 500.0);
        Ok(())
    }

    fn running(&self) -> bool {
        self.shared.is_running()
    }

    fn emit(&self, event: BotEvent) {
        self.shared.emit(event);
    }

    /// Humanized pause; false if a stop cut it short
    fn pause(&self, mean_ms: f64, stddev_ms: f64) -> bool {
        self.sleep_for(self.platform.humanizer.delay(mean_ms, stddev_ms))
    }

    fn sleep_for(&self, duration: Duration) -> bool {
        let clock = &self.platform.clock;
        let end = clock.now() + duration;
        loop {
            if !self.running() {
                return false;
            }
            let now = clock.now();
            if now >= end {
                return true;
            }
            clock.sleep((end - now).min(SLEEP_SLICE));
        }
    }
}

fn minutes(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(60))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "bot loop panicked".to_string()
    }
}
