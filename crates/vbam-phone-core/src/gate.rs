use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

/// Two-state gate the worker passes through before every step.
///
/// Two locks: `parked` guards the condvar the worker sleeps on while the gate
/// is closed, and `step` is held by the worker for the duration of a step.
/// `close` takes `step` so it returns only once any in-flight step has
/// finished; `open` and `wake` only ever take `parked`, so neither waits
/// behind a running step.
#[derive(Debug)]
pub struct PauseGate {
    running: AtomicBool,
    parked: Mutex<()>,
    cv: Condvar,
    step: Mutex<()>,
    control_locks: AtomicU64,
}

/// Held by the worker while a step runs.
pub type StepPermit<'a> = MutexGuard<'a, ()>;

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(m: &Mutex<()>) -> MutexGuard<'_, ()> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl PauseGate {
    /// Creates a closed gate.
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            parked: Mutex::new(()),
            cv: Condvar::new(),
            step: Mutex::new(()),
            control_locks: AtomicU64::new(0),
        }
    }

    fn control_lock<'a>(&self, m: &'a Mutex<()>) -> MutexGuard<'a, ()> {
        self.control_locks.fetch_add(1, Ordering::Relaxed);
        lock(m)
    }

    /// Closes the gate and waits for any in-flight step to finish.
    ///
    /// Returns `false` without touching either lock if the gate was already
    /// closed.
    pub fn close(&self) -> bool {
        if !self.running.swap(false, Ordering::AcqRel) {
            return false;
        }
        drop(self.control_lock(&self.step));
        true
    }

    /// Opens the gate and releases any waiting worker. Returns `false` if it
    /// was already open.
    pub fn open(&self) -> bool {
        if self.running.swap(true, Ordering::AcqRel) {
            return false;
        }
        let _parked = self.control_lock(&self.parked);
        self.cv.notify_all();
        true
    }

    /// Unlocked snapshot; may be stale by the time the caller acts on it.
    pub fn is_open(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of times `close`, `open` or `wake` took one of the gate's
    /// locks.
    pub fn lock_acquisitions(&self) -> u64 {
        self.control_locks.load(Ordering::Relaxed)
    }

    /// Blocks while the gate is closed and `cancel` is clear.
    ///
    /// Returns a permit to run one step, or `None` if cancellation won.
    pub fn enter(&self, cancel: &AtomicBool) -> Option<StepPermit<'_>> {
        loop {
            {
                let mut parked = lock(&self.parked);
                loop {
                    if cancel.load(Ordering::Acquire) {
                        return None;
                    }
                    if self.running.load(Ordering::Acquire) {
                        break;
                    }
                    parked = self.cv.wait(parked).unwrap_or_else(|e| e.into_inner());
                }
            }

            let permit = lock(&self.step);
            // A close that raced us is waiting on `step`; hand it over.
            if self.running.load(Ordering::Acquire) {
                return Some(permit);
            }
        }
    }

    /// Wakes a parked worker so it re-checks its cancellation flag. Never
    /// waits for a step in flight.
    pub fn wake(&self) {
        let _parked = self.control_lock(&self.parked);
        self.cv.notify_all();
    }
}
