use thiserror::Error;

use crate::engine::StepError;
use crate::scheduler::SchedulerError;
use crate::sound::SoundError;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("lifecycle controller used before initialize()")]
    NotInitialized,
    #[error("sound subsystem failed: {0}")]
    Sound(#[from] SoundError),
    #[error("could not schedule emulation worker: {0}")]
    Spawn(#[from] SchedulerError),
    #[error("emulation worker stopped on error: {0}")]
    Worker(#[from] StepError),
    #[error("emulation worker panicked")]
    WorkerPanicked,
    #[error("emulation worker did not stop within {0:?}")]
    StopTimedOut(std::time::Duration),
    #[error("background task ended without reporting a result")]
    TaskLost,
}
