//! Time source for every wait the engine performs

use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// Wall clock
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

type Alarm = (Duration, Box<dyn FnOnce() + Send>);

/// Virtual clock for simulations: `sleep` advances time instantly.
///
/// Alarms run on the sleeping thread the moment virtual time reaches them.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    alarms: Mutex<Vec<Alarm>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` once virtual time reaches `at`
    pub fn set_alarm(&self, at: Duration, f: impl FnOnce() + Send + 'static) {
        self.alarms.lock().push((at, Box::new(f)));
    }

    pub fn advance(&self, by: Duration) {
        let now = {
            let mut now = self.now.lock();
            *now += by;
            *now
        };

        let due: Vec<Alarm> = {
            let mut alarms = self.alarms.lock();
            let (due, pending): (Vec<Alarm>, Vec<Alarm>) =
                alarms.drain(..).partition(|(at, _)| *at <= now);
            *alarms = pending;
            due
        };
        for (_, alarm) in due {
            alarm();
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        thread::yield_now();
    }
}
