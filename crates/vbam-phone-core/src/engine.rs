use thiserror::Error;

/// Failure reported by the external emulation engine for a single step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("emulation step failed: {reason}")]
pub struct StepError {
    reason: String,
}

impl StepError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Channel layout of the frame buffer the engine renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub depth: u8,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// 32-bit layout expected by the presentation surface.
    pub const XBGR8888: Self = Self {
        depth: 32,
        red_shift: 19,
        green_shift: 11,
        blue_shift: 3,
    };
}

/// The external engine's "advance state" operation.
///
/// A single step must stay short: cancellation is only observed between steps.
pub trait EmulationStep: Send {
    fn step(&mut self) -> Result<(), StepError>;

    /// Called once from `LifecycleController::initialize`, before any step.
    fn configure(&mut self, _format: &PixelFormat) {}
}

impl<F> EmulationStep for F
where
    F: FnMut() -> Result<(), StepError> + Send,
{
    fn step(&mut self) -> Result<(), StepError> {
        self()
    }
}
