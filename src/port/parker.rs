//! Thread parking for the port's consumer.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A one-permit parker: `unpark` stores a permit, `park` consumes it or blocks.
#[derive(Debug, Default)]
pub(crate) struct Parker {
    notified: Mutex<bool>,
    cvar: Condvar,
}

impl Parker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Parks the current thread until notified.
    pub(crate) fn park(&self) {
        let mut notified = self.notified.lock();
        while !*notified {
            self.cvar.wait(&mut notified);
        }
        *notified = false;
    }

    /// Parks until notified or `duration` elapses.
    ///
    /// Returns `true` if a permit was consumed.
    pub(crate) fn park_timeout(&self, duration: Duration) -> bool {
        let Some(until) = Instant::now().checked_add(duration) else {
            self.park();
            return true;
        };
        let mut notified = self.notified.lock();
        while !*notified {
            if self.cvar.wait_until(&mut notified, until).timed_out() {
                break;
            }
        }
        std::mem::replace(&mut *notified, false)
    }

    /// Stores a permit and wakes a parked thread.
    pub(crate) fn unpark(&self) {
        {
            let mut notified = self.notified.lock();
            *notified = true;
        }
        self.cvar.notify_one();
    }
}
