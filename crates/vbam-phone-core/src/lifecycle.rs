//! Background emulation worker and the control operations around it.
//!
//! One foreground caller (the UI/render thread) drives the controller; one
//! worker thread runs the step loop. Control flows through signals and flags
//! only; no frame data crosses this boundary.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel as cb;
use log::{debug, error, info, warn};

use crate::engine::{EmulationStep, PixelFormat, StepError};
use crate::error::LifecycleError;
use crate::gate::PauseGate;
use crate::rom::{RomSlot, RomSource};
use crate::scheduler::{HostScheduler, TaskHandle};
use crate::signal::Signal;
use crate::sound::SoundSystem;

const WORKER_TASK_NAME: &str = "vbam-emulation";
const UNLOAD_TASK_NAME: &str = "vbam-unload";

/// Handshake events between the controller and the worker.
#[derive(Debug)]
pub struct ControlSignals {
    /// The worker waits on this once before entering its loop.
    pub update: Signal,
    /// Set by the worker exactly once, when its loop exits.
    pub end: Signal,
    /// Frame handoff with the presentation surface. Starts set.
    pub swap: Signal,
}

impl Default for ControlSignals {
    fn default() -> Self {
        Self {
            update: Signal::new(false),
            end: Signal::new(false),
            swap: Signal::new(true),
        }
    }
}

/// State shared with the worker thread.
struct Shared {
    signals: ControlSignals,
    stop_requested: AtomicBool,
    gate: PauseGate,
    engine: Mutex<Box<dyn EmulationStep>>,
    fault: Mutex<Option<StepError>>,
    steps: AtomicU64,
}

impl Shared {
    fn engine(&self) -> MutexGuard<'_, Box<dyn EmulationStep>> {
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fault(&self) -> MutexGuard<'_, Option<StepError>> {
        self.fault.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Sets the end signal when the worker body unwinds, panics included.
struct EndOnDrop<'a>(&'a Signal);

impl Drop for EndOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set();
    }
}

fn run_worker(shared: Arc<Shared>) {
    let _end = EndOnDrop(&shared.signals.end);

    shared.signals.update.wait();
    info!("emulation worker started");

    while !shared.stop_requested.load(Ordering::Acquire) {
        let Some(_permit) = shared.gate.enter(&shared.stop_requested) else {
            break;
        };

        let result = shared.engine().step();
        match result {
            Ok(()) => {
                shared.steps.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!("emulation step failed, stopping worker: {e}");
                *shared.fault() = Some(e);
                break;
            }
        }
    }

    info!(
        "emulation worker ended after {} steps",
        shared.steps.load(Ordering::Relaxed)
    );
}

/// Owns the emulation worker and serializes every transition around it.
///
/// At most one worker exists at a time. Callers share the controller through
/// an `Arc`; it holds no process-wide state of its own.
pub struct LifecycleController {
    shared: Arc<Shared>,
    initialized: AtomicBool,
    /// Creation mutex: every worker start/stop happens under it.
    worker: Mutex<Option<TaskHandle>>,
    sound: Mutex<Box<dyn SoundSystem>>,
    scheduler: Arc<dyn HostScheduler>,
    rom: RomSlot,
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("initialized", &self.initialized.load(Ordering::Relaxed))
            .field("paused", &self.is_paused())
            .field("rom", &self.rom.get())
            .finish_non_exhaustive()
    }
}

impl LifecycleController {
    pub fn new(
        engine: impl EmulationStep + 'static,
        sound: impl SoundSystem + 'static,
        scheduler: Arc<dyn HostScheduler>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                signals: ControlSignals::default(),
                stop_requested: AtomicBool::new(false),
                gate: PauseGate::new(),
                engine: Mutex::new(Box::new(engine)),
                fault: Mutex::new(None),
                steps: AtomicU64::new(0),
            }),
            initialized: AtomicBool::new(false),
            worker: Mutex::new(None),
            sound: Mutex::new(Box::new(sound)),
            scheduler,
            rom: RomSlot::default(),
        }
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<TaskHandle>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sound(&self) -> MutexGuard<'_, Box<dyn SoundSystem>> {
        self.sound.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One-time setup: pushes the frame buffer layout to the engine.
    ///
    /// Returns `false` if the controller was already initialized.
    pub fn initialize(&self) -> bool {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.shared.engine().configure(&PixelFormat::XBGR8888);
        debug!("lifecycle controller initialized");
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Schedules the worker unless one is already held.
    ///
    /// Returns `Ok(false)` if a worker was already active.
    pub fn start_thread(&self) -> Result<bool, LifecycleError> {
        if !self.is_initialized() {
            return Err(LifecycleError::NotInitialized);
        }

        let mut slot = self.worker_slot();
        if slot.is_some() {
            return Ok(false);
        }

        // The worker runs hot; keep the calling (UI) thread responsive.
        if let Err(e) = self.scheduler.raise_process_priority() {
            warn!("process priority hint failed: {e}");
        }
        if let Err(e) = self.scheduler.lower_current_thread_priority() {
            warn!("thread priority hint failed: {e}");
        }

        self.shared.stop_requested.store(false, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let handle = self
            .scheduler
            .spawn(WORKER_TASK_NAME, Box::new(move || run_worker(shared)))?;
        debug!("scheduled worker task `{}`", handle.name());
        *slot = Some(handle);
        Ok(true)
    }

    /// Stops the worker and blocks until it has signalled its exit.
    ///
    /// Returns `Ok(false)` if no worker was active. A step failure that ended
    /// the worker is reported here, once.
    pub fn stop_thread(&self) -> Result<bool, LifecycleError> {
        self.stop_worker(None)
    }

    /// Like [`LifecycleController::stop_thread`] with a bounded wait.
    ///
    /// On timeout the worker stays registered, so no second worker can be
    /// started; a later stop call completes the shutdown.
    pub fn stop_thread_timeout(&self, timeout: Duration) -> Result<bool, LifecycleError> {
        self.stop_worker(Some(timeout))
    }

    fn stop_worker(&self, timeout: Option<Duration>) -> Result<bool, LifecycleError> {
        let mut slot = self.worker_slot();
        if slot.is_none() {
            return Ok(false);
        }

        let signals = &self.shared.signals;
        self.shared.stop_requested.store(true, Ordering::Release);
        // A worker still waiting to begin must not sleep through the stop.
        signals.update.set();
        self.shared.gate.wake();

        match timeout {
            None => signals.end.wait(),
            Some(limit) => {
                if !signals.end.wait_timeout(limit) {
                    warn!("emulation worker still running after {limit:?}; abandoning wait");
                    return Err(LifecycleError::StopTimedOut(limit));
                }
            }
        }

        let clean_exit = slot.take().map(TaskHandle::join).unwrap_or(true);
        signals.update.reset();
        debug!("emulation worker joined");

        if !clean_exit {
            return Err(LifecycleError::WorkerPanicked);
        }
        match self.shared.fault().take() {
            Some(e) => Err(LifecycleError::Worker(e)),
            None => Ok(true),
        }
    }

    /// Whether a worker handle is currently held.
    pub fn has_worker(&self) -> bool {
        self.worker_slot().is_some()
    }

    /// Releases a worker waiting to enter its step loop.
    pub fn start(&self) {
        self.shared.signals.update.set();
    }

    /// Brings sound up and makes sure a worker exists. Pause state is left
    /// to the caller.
    pub fn resume(&self) -> Result<(), LifecycleError> {
        if !self.has_worker() {
            self.shared.signals.swap.reset();
            self.shared.signals.update.reset();
        }

        self.sound().init()?;
        self.start_thread()?;
        Ok(())
    }

    /// Inverse of [`LifecycleController::resume`]. Must run before anything
    /// the worker touches is torn down.
    pub fn suspend(&self) -> Result<(), LifecycleError> {
        let stopped = self.stop_thread();
        let sound = self.sound().shutdown();
        stopped?;
        sound?;
        Ok(())
    }

    /// Closes the pause gate, waiting out any step in flight.
    ///
    /// Returns `false` without blocking when already paused.
    pub fn pause(&self) -> bool {
        let changed = self.shared.gate.close();
        if changed {
            debug!("emulation paused");
        }
        changed
    }

    /// Opens the pause gate. Does nothing unless paused with a ROM loaded.
    pub fn unpause(&self) -> bool {
        if !self.rom.is_loaded() {
            return false;
        }
        let changed = self.shared.gate.open();
        if changed {
            debug!("emulation unpaused");
        }
        changed
    }

    /// Lock-free snapshot; may be momentarily stale.
    pub fn is_paused(&self) -> bool {
        !self.shared.gate.is_open()
    }

    pub fn pause_gate(&self) -> &PauseGate {
        &self.shared.gate
    }

    pub fn is_rom_loaded(&self) -> bool {
        self.rom.is_loaded()
    }

    pub fn rom(&self) -> Option<RomSource> {
        self.rom.get()
    }

    /// Records a loaded ROM. Called by the ROM-loading collaborator once the
    /// engine has the image.
    pub fn load_rom(&self, rom: RomSource) {
        info!("ROM loaded: {}", rom.file().display());
        self.rom.set(rom);
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), LifecycleError> {
        self.sound().set_volume(volume.clamp(0.0, 1.0))?;
        Ok(())
    }

    /// Number of successful steps since the controller was created.
    pub fn step_count(&self) -> u64 {
        self.shared.steps.load(Ordering::Relaxed)
    }

    /// Frame handoff signal for the presentation layer.
    pub fn swap_signal(&self) -> &Signal {
        &self.shared.signals.swap
    }

    /// Unloads the current ROM on a background task.
    pub fn stop_emulation_async(self: &Arc<Self>) -> PendingUnload {
        let (tx, rx) = cb::bounded(1);
        let task_tx = tx.clone();
        let this = Arc::clone(self);
        let spawned = self.scheduler.spawn(
            UNLOAD_TASK_NAME,
            Box::new(move || {
                let _ = task_tx.send(this.unload_rom());
            }),
        );

        match spawned {
            Ok(handle) => PendingUnload {
                rx,
                handle: Some(handle),
            },
            Err(e) => {
                let _ = tx.send(Err(e.into()));
                PendingUnload { rx, handle: None }
            }
        }
    }

    /// Synchronous body of [`LifecycleController::stop_emulation_async`].
    pub fn unload_rom(&self) -> Result<(), LifecycleError> {
        if !self.rom.is_loaded() {
            return Ok(());
        }

        self.pause();
        let sound = self.sound().init();
        if let Some(rom) = self.rom.clear() {
            info!("ROM unloaded: {}", rom.file().display());
        }
        sound?;
        Ok(())
    }
}

/// Completion handle for [`LifecycleController::stop_emulation_async`].
#[derive(Debug)]
pub struct PendingUnload {
    rx: cb::Receiver<Result<(), LifecycleError>>,
    handle: Option<TaskHandle>,
}

impl PendingUnload {
    pub fn wait(mut self) -> Result<(), LifecycleError> {
        let result = self.rx.recv().unwrap_or(Err(LifecycleError::TaskLost));
        if let Some(handle) = self.handle.take() {
            handle.join();
        }
        result
    }

    /// Returns `None` if the unload has not finished within `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<(), LifecycleError>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(cb::RecvTimeoutError::Timeout) => None,
            Err(cb::RecvTimeoutError::Disconnected) => Some(Err(LifecycleError::TaskLost)),
        }
    }
}
