use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Auto-resetting binary event.
///
/// A `set` stays latched until exactly one waiter consumes it; waiters that
/// arrive later block until the next `set`.
#[derive(Debug, Default)]
pub struct Signal {
    state: Mutex<bool>,
    cv: Condvar,
}

impl Signal {
    pub fn new(initially_set: bool) -> Self {
        Self {
            state: Mutex::new(initially_set),
            cv: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self) {
        let mut set = self.lock();
        *set = true;
        self.cv.notify_one();
    }

    pub fn reset(&self) {
        *self.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.lock()
    }

    /// Blocks until the signal is set, then consumes it.
    pub fn wait(&self) {
        let mut set = self.lock();
        while !*set {
            set = self.cv.wait(set).unwrap_or_else(|e| e.into_inner());
        }
        *set = false;
    }

    /// Like [`Signal::wait`] but gives up after `timeout`.
    ///
    /// Returns `true` if the signal was consumed. A timeout too large to
    /// represent as a deadline waits without a bound.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut set = self.lock();
        while !*set {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cv
                .wait_timeout(set, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            set = guard;
        }
        *set = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn set_is_consumed_by_a_single_wait() {
        let signal = Signal::new(false);
        signal.set();
        assert!(signal.is_set());
        signal.wait();
        assert!(!signal.is_set());
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn initially_set_signal_releases_first_waiter() {
        let signal = Signal::new(true);
        assert!(signal.wait_timeout(Duration::from_millis(10)));
        assert!(!signal.is_set());
    }

    #[test]
    fn reset_clears_a_latched_set() {
        let signal = Signal::new(true);
        signal.reset();
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn set_from_another_thread_releases_waiter() {
        let signal = Arc::new(Signal::new(false));
        let setter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                signal.set();
            })
        };
        assert!(signal.wait_timeout(Duration::from_secs(5)));
        setter.join().expect("setter thread");
    }

    #[test]
    fn unrepresentable_timeout_waits_without_bound() {
        let signal = Signal::new(true);
        assert!(signal.wait_timeout(Duration::MAX));
        assert!(!signal.is_set());
    }
}
