//! Emulation lifecycle core for a phone-hosted GBA frontend.
//!
//! The emulation engine, audio backend and presentation surface are external;
//! this crate owns the background worker that steps the engine and the
//! synchronous start/stop/pause handshakes a UI thread needs around it.
//! Frontends construct a [`LifecycleController`] and usually drive it through
//! a [`session::Session`].

/// Step callback seam and pixel format handed to the engine.
pub mod engine;

pub mod error;

/// Pause gate checked by the worker before each step.
pub mod gate;

/// Worker thread and control operations.
pub mod lifecycle;

/// Loaded ROM file/folder pair.
pub mod rom;

/// Save-state slot selection.
pub mod savestate;

/// Execution contexts and priority hints supplied by the host.
pub mod scheduler;

pub mod session;

/// Auto-reset events used for worker handshakes.
pub mod signal;

/// Audio backend seam.
pub mod sound;

pub use engine::{EmulationStep, PixelFormat, StepError};
pub use error::LifecycleError;
pub use lifecycle::{LifecycleController, PendingUnload};
pub use rom::RomSource;
pub use scheduler::{HostScheduler, ThreadScheduler};
pub use sound::{NullSound, SoundError, SoundSystem};
