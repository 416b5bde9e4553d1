use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SoundError {
    #[error("no audio output device: {0}")]
    Device(String),
    #[error("audio stream error: {0}")]
    Stream(String),
    #[error("sound system is not initialized")]
    NotInitialized,
}

/// Audio backend driven around resume/suspend transitions.
pub trait SoundSystem: Send {
    fn init(&mut self) -> Result<(), SoundError>;
    fn shutdown(&mut self) -> Result<(), SoundError>;
    /// `volume` is linear, 0.0 (mute) to 1.0.
    fn set_volume(&mut self, volume: f32) -> Result<(), SoundError>;
}

/// Sound system that accepts every call and produces nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSound {
    active: bool,
}

impl NullSound {
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl SoundSystem for NullSound {
    fn init(&mut self) -> Result<(), SoundError> {
        self.active = true;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), SoundError> {
        self.active = false;
        Ok(())
    }

    fn set_volume(&mut self, _volume: f32) -> Result<(), SoundError> {
        Ok(())
    }
}
