//! Synthetic keyboard and mouse input
//!
//! Keys are injected by hardware scan code because the game reads raw
//! input. Every key press is split into key-down, a humanized dwell and
//! key-up, and every pointer move follows an eased, slightly curved path.

use std::sync::Arc;

#[cfg(windows)]
use enigo::{Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
#[cfg(windows)]
use parking_lot::Mutex;

use crate::engine::clock::Clock;
use crate::error::InputError;
use crate::screen_reader::Point;
use crate::utils::Humanizer;

/// Mean and deviation of the key-down to key-up dwell, in ms
const DWELL_MEAN_MS: f64 = 85.0;
const DWELL_STDDEV_MS: f64 = 20.0;

/// Moves shorter than this jump straight to the target
pub const DIRECT_MOVE_THRESHOLD: f64 = 5.0;

pub const MIN_STEPS: i32 = 20;
pub const MAX_STEPS: i32 = 60;

/// Pacing between intermediate pointer moves, in ms
const STEP_DELAY_MEAN_MS: f64 = 10.0;
const STEP_DELAY_STDDEV_MS: f64 = 2.0;

/// OS input surface, one implementation per platform
pub trait InputBackend: Send + Sync {
    fn key_down(&self, scan_code: u16) -> Result<(), InputError>;

    fn key_up(&self, scan_code: u16) -> Result<(), InputError>;

    /// Teleport the pointer to an absolute screen coordinate
    fn move_pointer(&self, x: i32, y: i32) -> Result<(), InputError>;

    fn pointer_position(&self) -> Result<Point, InputError>;

    /// Physical state of a key, used for the stop hotkey
    fn is_key_pressed(&self, scan_code: u16) -> bool;
}

/// Native input through `enigo` with scan-code injection
#[cfg(windows)]
pub struct NativeInput {
    enigo: Mutex<Enigo>,
}

#[cfg(windows)]
impl NativeInput {
    pub fn new() -> Result<Self, InputError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| InputError::Injection(format!("{:?}", e)))?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn key(&self, scan_code: u16, direction: Direction) -> Result<(), InputError> {
        self.enigo
            .lock()
            .raw(scan_code, direction)
            .map_err(|e| InputError::Injection(format!("scan code 0x{:02X}: {:?}", scan_code, e)))
    }
}

#[cfg(windows)]
impl InputBackend for NativeInput {
    fn key_down(&self, scan_code: u16) -> Result<(), InputError> {
        self.key(scan_code, Direction::Press)
    }

    fn key_up(&self, scan_code: u16) -> Result<(), InputError> {
        self.key(scan_code, Direction::Release)
    }

    fn move_pointer(&self, x: i32, y: i32) -> Result<(), InputError> {
        self.enigo
            .lock()
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| InputError::Injection(format!("move to ({}, {}): {:?}", x, y, e)))
    }

    fn pointer_position(&self) -> Result<Point, InputError> {
        let (x, y) = self
            .enigo
            .lock()
            .location()
            .map_err(|e| InputError::Injection(format!("{:?}", e)))?;
        Ok(Point::new(x, y))
    }

    fn is_key_pressed(&self, scan_code: u16) -> bool {
        use windows::Win32::UI::Input::KeyboardAndMouse::{
            GetAsyncKeyState, MapVirtualKeyW, MAPVK_VSC_TO_VK,
        };

        let vk = unsafe { MapVirtualKeyW(scan_code as u32, MAPVK_VSC_TO_VK) };
        if vk == 0 {
            return false;
        }
        let state = unsafe { GetAsyncKeyState(vk as i32) };
        (state as u16 & 0x8000) != 0
    }
}

/// Placeholder on platforms without an injection backend
#[cfg(not(windows))]
pub struct NativeInput;

#[cfg(not(windows))]
impl NativeInput {
    pub fn new() -> Result<Self, InputError> {
        tracing::warn!("[INPUT] Input injection not implemented on this platform");
        Err(InputError::Unsupported)
    }
}

#[cfg(not(windows))]
impl InputBackend for NativeInput {
    fn key_down(&self, _scan_code: u16) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }

    fn key_up(&self, _scan_code: u16) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }

    fn move_pointer(&self, _x: i32, _y: i32) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }

    fn pointer_position(&self) -> Result<Point, InputError> {
        Err(InputError::Unsupported)
    }

    fn is_key_pressed(&self, _scan_code: u16) -> bool {
        false
    }
}

/// Number of intermediate points for a move of `distance` pixels
pub fn step_count(distance: f64, humanizer: &Humanizer) -> i32 {
    let steps = (distance / 20.0) as i32 + humanizer.uniform_int(15, 25);
    steps.clamp(MIN_STEPS, MAX_STEPS)
}

/// Intermediate points of a humanized move, excluding the final snap.
///
/// The path is a quadratic Bézier through a control point pushed sideways
/// off the straight line, sampled with a cubic ease-out so the pointer
/// decelerates into the target. All but the last point get ±1px tremor.
/// Returns an empty path for moves shorter than [`DIRECT_MOVE_THRESHOLD`].
pub fn plan_path(from: Point, to: Point, humanizer: &Humanizer) -> Vec<Point> {
    let distance = from.distance(to);
    if distance < DIRECT_MOVE_THRESHOLD {
        return Vec::new();
    }

    let steps = step_count(distance, humanizer);

    let offset_x = (to.y - from.y) / 4 + humanizer.uniform_int(-20, 20);
    let offset_y = (from.x - to.x) / 4 + humanizer.uniform_int(-20, 20);
    let control = Point::new(
        (from.x + to.x) / 2 + offset_x / 2,
        (from.y + to.y) / 2 + offset_y / 2,
    );

    (1..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            let ease = 1.0 - (1.0 - t).powi(3);
            let inv = 1.0 - ease;

            let bezier = |a: i32, c: i32, b: i32| {
                (inv * inv * a as f64 + 2.0 * inv * ease * c as f64 + ease * ease * b as f64)
                    as i32
            };
            let mut x = bezier(from.x, control.x, to.x);
            let mut y = bezier(from.y, control.y, to.y);

            if i < steps {
                x += humanizer.uniform_int(-1, 1);
                y += humanizer.uniform_int(-1, 1);
            }
            Point::new(x, y)
        })
        .collect()
}

/// Humanized key and pointer actuator on top of an [`InputBackend`]
#[derive(Clone)]
pub struct Actuator {
    backend: Arc<dyn InputBackend>,
    humanizer: Arc<Humanizer>,
    clock: Arc<dyn Clock>,
}

impl Actuator {
    pub fn new(
        backend: Arc<dyn InputBackend>,
        humanizer: Arc<Humanizer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            humanizer,
            clock,
        }
    }

    /// Key-down, humanized dwell, key-up
    pub fn press(&self, scan_code: u16) -> Result<(), InputError> {
        tracing::trace!("[INPUT] press 0x{:02X}", scan_code);
        self.backend.key_down(scan_code)?;
        self.clock
            .sleep(self.humanizer.delay(DWELL_MEAN_MS, DWELL_STDDEV_MS));
        self.backend.key_up(scan_code)
    }

    /// Press each key in order
    pub fn type_keys(&self, scan_codes: &[u16]) -> Result<(), InputError> {
        for code in scan_codes {
            self.press(*code)?;
        }
        Ok(())
    }

    /// Glide the pointer to `target`; returns the number of intermediate steps
    pub fn move_to(&self, target: Point) -> Result<usize, InputError> {
        let start = match self.backend.pointer_position() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("[INPUT] Pointer position unavailable, jumping: {}", e);
                target
            }
        };

        let path = plan_path(start, target, &self.humanizer);
        for point in &path {
            self.backend.move_pointer(point.x, point.y)?;
            self.clock.sleep(
                self.humanizer
                    .small_delay(STEP_DELAY_MEAN_MS, STEP_DELAY_STDDEV_MS),
            );
        }

        self.backend.move_pointer(target.x, target.y)?;
        Ok(path.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::ManualClock;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Down(u16),
        Up(u16),
        Move(i32, i32),
    }

    struct Recorder {
        calls: parking_lot::Mutex<Vec<(Duration, Call)>>,
        pointer: parking_lot::Mutex<Point>,
        clock: Arc<ManualClock>,
    }

    impl Recorder {
        fn new(clock: Arc<ManualClock>, pointer: Point) -> Arc<Self> {
            Arc::new(Self {
                calls: parking_lot::Mutex::new(Vec::new()),
                pointer: parking_lot::Mutex::new(pointer),
                clock,
            })
        }

        fn record(&self, call: Call) {
            self.calls.lock().push((self.clock.now(), call));
        }
    }

    impl InputBackend for Recorder {
        fn key_down(&self, scan_code: u16) -> Result<(), InputError> {
            self.record(Call::Down(scan_code));
            Ok(())
        }

        fn key_up(&self, scan_code: u16) -> Result<(), InputError> {
            self.record(Call::Up(scan_code));
            Ok(())
        }

        fn move_pointer(&self, x: i32, y: i32) -> Result<(), InputError> {
            *self.pointer.lock() = Point::new(x, y);
            self.record(Call::Move(x, y));
            Ok(())
        }

        fn pointer_position(&self) -> Result<Point, InputError> {
            Ok(*self.pointer.lock())
        }

        fn is_key_pressed(&self, _scan_code: u16) -> bool {
            false
        }
    }

    fn actuator(start: Point, seed: u64) -> (Actuator, Arc<Recorder>) {
        let clock = Arc::new(ManualClock::new());
        let recorder = Recorder::new(clock.clone(), start);
        let act = Actuator::new(recorder.clone(), Arc::new(Humanizer::seeded(seed)), clock);
        (act, recorder)
    }

    #[test]
    fn test_press_holds_key_for_dwell_time() {
        let (act, rec) = actuator(Point::new(0, 0), 9);
        for _ in 0..200 {
            act.press(0x44).unwrap();
        }
        let calls = rec.calls.lock();
        assert_eq!(calls.len(), 400);
        for pair in calls.chunks(2) {
            assert_eq!(pair[0].1, Call::Down(0x44));
            assert_eq!(pair[1].1, Call::Up(0x44));
            assert!(pair[1].0 - pair[0].0 >= Duration::from_millis(50));
        }
    }

    #[test]
    fn test_short_move_is_direct() {
        let (act, rec) = actuator(Point::new(100, 100), 1);
        let steps = act.move_to(Point::new(103, 96)).unwrap();
        assert_eq!(steps, 0);
        assert_eq!(*rec.calls.lock(), vec![(Duration::ZERO, Call::Move(103, 96))]);
    }

    #[test]
    fn test_long_move_ends_exactly_on_target() {
        for seed in 0..50 {
            let (act, rec) = actuator(Point::new(10, 900), seed);
            let target = Point::new(1500, 120);
            let steps = act.move_to(target).unwrap();

            assert!((MIN_STEPS as usize..=MAX_STEPS as usize).contains(&steps));
            let calls = rec.calls.lock();
            assert_eq!(calls.len(), steps + 1);
            assert_eq!(calls.last().unwrap().1, Call::Move(1500, 120));
            assert_eq!(*rec.pointer.lock(), target);
        }
    }

    #[test]
    fn test_step_count_is_clamped() {
        let h = Humanizer::seeded(4);
        for distance in [5.0, 50.0, 400.0, 5000.0] {
            for _ in 0..50 {
                let steps = step_count(distance, &h);
                assert!((MIN_STEPS..=MAX_STEPS).contains(&steps), "{} -> {}", distance, steps);
            }
        }
        assert_eq!(step_count(5000.0, &h), MAX_STEPS);
    }

    #[test]
    fn test_path_is_curved_and_eased() {
        let h = Humanizer::seeded(21);
        let from = Point::new(0, 0);
        let to = Point::new(1000, 0);
        let path = plan_path(from, to, &h);

        // the control point sits off the x axis, so the path bows away from it
        assert!(path.iter().any(|p| p.y.abs() > 10));

        // ease-out: the first step covers more ground than the last
        let first = from.distance(path[0]);
        let last = path[path.len() - 2].distance(path[path.len() - 1]);
        assert!(first > last);

        // the last planned point carries no tremor
        assert_eq!(*path.last().unwrap(), to);
    }

    #[test]
    fn test_moves_are_paced() {
        let (act, rec) = actuator(Point::new(0, 0), 2);
        let steps = act.move_to(Point::new(600, 400)).unwrap();
        let calls = rec.calls.lock();
        // one pacing delay of at least 1ms after every intermediate point
        assert_eq!(calls[0].0, Duration::ZERO);
        for pair in calls.windows(2) {
            assert!(pair[1].0 > pair[0].0);
        }
        assert!(calls[steps].0 >= Duration::from_millis(steps as u64));
    }
}
