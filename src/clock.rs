// Wall-clock access for GamblingDen Core
//
// Daily bonus eligibility and the time-based achievements depend on the
// player's local calendar, so time is read through a port that tests can
// drive by hand.

use chrono::{DateTime, Duration, Local};
use std::cell::Cell;
use std::rc::Rc;

pub trait Clock {
    /// Current local date and time
    fn now(&self) -> DateTime<Local>;
}

/// The real local clock (`Date` in the browser)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Hand-driven clock; clones share the same instant
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Local>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> ManualClock {
        ManualClock {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, instant: DateTime<Local>) {
        self.now.set(instant);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        self.now.get()
    }
}
