#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use vbam_phone_core::scheduler::{HostScheduler, SchedulerError, Task, TaskHandle};
use vbam_phone_core::{
    EmulationStep, LifecycleController, PixelFormat, SoundError, SoundSystem, StepError,
    ThreadScheduler,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Polls `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Thread scheduler that counts spawns and priority hints.
#[derive(Default)]
pub struct CountingScheduler {
    pub spawns: AtomicUsize,
    pub priority_hints: AtomicUsize,
    pub fail_spawn: AtomicBool,
}

impl HostScheduler for CountingScheduler {
    fn spawn(&self, name: &str, task: Task) -> Result<TaskHandle, SchedulerError> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(SchedulerError::Spawn {
                name: name.to_owned(),
                source: std::io::Error::other("spawn refused by test"),
            });
        }
        self.spawns.fetch_add(1, Ordering::SeqCst);
        ThreadScheduler.spawn(name, task)
    }

    fn raise_process_priority(&self) -> Result<(), SchedulerError> {
        self.priority_hints.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn lower_current_thread_priority(&self) -> Result<(), SchedulerError> {
        self.priority_hints.fetch_add(1, Ordering::SeqCst);
        Err(SchedulerError::PriorityRejected("test host".into()))
    }
}

impl CountingScheduler {
    pub fn worker_spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct SoundLog {
    pub inits: usize,
    pub shutdowns: usize,
    pub volume: Option<f32>,
    pub fail_init: bool,
    pub fail_shutdown: bool,
}

/// Sound system recording every call into a shared log.
#[derive(Clone, Default)]
pub struct RecordingSound {
    pub log: Arc<Mutex<SoundLog>>,
}

impl RecordingSound {
    pub fn snapshot(&self) -> (usize, usize) {
        let log = self.log.lock().expect("sound log");
        (log.inits, log.shutdowns)
    }

    pub fn fail_init(&self, fail: bool) {
        self.log.lock().expect("sound log").fail_init = fail;
    }

    pub fn fail_shutdown(&self, fail: bool) {
        self.log.lock().expect("sound log").fail_shutdown = fail;
    }
}

impl SoundSystem for RecordingSound {
    fn init(&mut self) -> Result<(), SoundError> {
        let mut log = self.log.lock().expect("sound log");
        if log.fail_init {
            return Err(SoundError::Device("no device in test".into()));
        }
        log.inits += 1;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), SoundError> {
        let mut log = self.log.lock().expect("sound log");
        if log.fail_shutdown {
            return Err(SoundError::Stream("stream stuck in test".into()));
        }
        log.shutdowns += 1;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), SoundError> {
        self.log.lock().expect("sound log").volume = Some(volume);
        Ok(())
    }
}

/// Step callback that counts steps and configure calls.
#[derive(Clone, Default)]
pub struct CountingStep {
    pub steps: Arc<AtomicUsize>,
    pub configured: Arc<Mutex<Vec<PixelFormat>>>,
    /// Fail once this many steps have run.
    pub fail_after: Option<usize>,
    pub step_delay: Option<Duration>,
}

impl CountingStep {
    pub fn count(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }
}

impl EmulationStep for CountingStep {
    fn step(&mut self) -> Result<(), StepError> {
        let done = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.step_delay {
            thread::sleep(delay);
        }
        match self.fail_after {
            Some(limit) if done >= limit => Err(StepError::new("bad opcode")),
            _ => Ok(()),
        }
    }

    fn configure(&mut self, format: &PixelFormat) {
        self.configured.lock().expect("configure log").push(*format);
    }
}

pub struct Harness {
    pub controller: Arc<LifecycleController>,
    pub scheduler: Arc<CountingScheduler>,
    pub sound: RecordingSound,
    pub step: CountingStep,
}

pub fn harness_with(step: CountingStep) -> Harness {
    init_logging();
    let scheduler = Arc::new(CountingScheduler::default());
    let sound = RecordingSound::default();
    let controller = Arc::new(LifecycleController::new(
        step.clone(),
        sound.clone(),
        scheduler.clone(),
    ));
    Harness {
        controller,
        scheduler,
        sound,
        step,
    }
}

pub fn harness() -> Harness {
    harness_with(CountingStep::default())
}
