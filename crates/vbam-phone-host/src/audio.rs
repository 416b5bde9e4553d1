//! `cpal` output for the host build.
//!
//! `cpal::Stream` is not `Send` on every platform, so the stream lives on a
//! dedicated audio thread and is driven over a channel.

use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel as cb;
use log::{debug, warn};
use vbam_phone_core::{NullSound, SoundError, SoundSystem};

enum AudioCmd {
    Stop,
}

struct Running {
    tx: cb::Sender<AudioCmd>,
    thread: JoinHandle<()>,
}

/// Holds the default output device open while emulation is resumed.
///
/// Samples come from the external sound driver; until one is attached the
/// stream renders silence. The volume is recorded for that driver's mixer and
/// reported when the stream opens; silence is never scaled.
pub struct CpalSound {
    volume: f32,
    running: Option<Running>,
}

impl Default for CpalSound {
    fn default() -> Self {
        Self {
            volume: 1.0,
            running: None,
        }
    }
}

fn open_stream() -> Result<cpal::Stream, SoundError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| SoundError::Device("no default output device".into()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| SoundError::Device(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let err_fn = |err| warn!("cpal stream error: {err}");

    let stream = match sample_format {
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _| data.fill(0),
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_output_stream(
            &config,
            move |data: &mut [u16], _| data.fill(u16::MAX / 2 + 1),
            err_fn,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _| data.fill(0.0),
            err_fn,
            None,
        ),
        other => {
            return Err(SoundError::Stream(format!(
                "unsupported sample format {other:?}"
            )));
        }
    }
    .map_err(|e| SoundError::Stream(e.to_string()))?;
    stream
        .play()
        .map_err(|e| SoundError::Stream(e.to_string()))?;
    Ok(stream)
}

impl SoundSystem for CpalSound {
    fn init(&mut self) -> Result<(), SoundError> {
        if self.running.is_some() {
            return Ok(());
        }

        let (tx, rx) = cb::bounded::<AudioCmd>(1);
        let (ready_tx, ready_rx) = cb::bounded(1);
        let thread = thread::Builder::new()
            .name("vbam-audio".into())
            .spawn(move || {
                let stream = match open_stream() {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Any command, or the sender going away, ends playback.
                let _ = rx.recv();
                drop(stream);
            })
            .map_err(|e| SoundError::Stream(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!("audio stream opened (volume {:.2})", self.volume);
                self.running = Some(Running { tx, thread });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(SoundError::Stream("audio thread exited during setup".into()))
            }
        }
    }

    fn shutdown(&mut self) -> Result<(), SoundError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let _ = running.tx.send(AudioCmd::Stop);
        running
            .thread
            .join()
            .map_err(|_| SoundError::Stream("audio thread panicked".into()))?;
        debug!("audio stream closed");
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), SoundError> {
        self.volume = volume;
        Ok(())
    }
}

impl Drop for CpalSound {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Sound backend picked at startup.
pub enum HostSound {
    Cpal(CpalSound),
    Muted(NullSound),
}

impl HostSound {
    pub fn new(enabled: bool) -> Self {
        if enabled {
            Self::Cpal(CpalSound::default())
        } else {
            Self::Muted(NullSound::default())
        }
    }
}

impl SoundSystem for HostSound {
    fn init(&mut self) -> Result<(), SoundError> {
        match self {
            Self::Cpal(s) => s.init(),
            Self::Muted(s) => s.init(),
        }
    }

    fn shutdown(&mut self) -> Result<(), SoundError> {
        match self {
            Self::Cpal(s) => s.shutdown(),
            Self::Muted(s) => s.shutdown(),
        }
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), SoundError> {
        match self {
            Self::Cpal(s) => s.set_volume(volume),
            Self::Muted(s) => s.set_volume(volume),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_is_recorded_without_an_open_stream() {
        let mut sound = CpalSound::default();
        assert_eq!(sound.volume, 1.0);
        sound.set_volume(0.25).expect("volume");
        assert_eq!(sound.volume, 0.25);
        assert!(sound.running.is_none());
        sound.shutdown().expect("shutdown without init");
    }

    #[test]
    fn muted_backend_accepts_full_lifecycle() {
        let mut sound = HostSound::new(false);
        assert!(matches!(sound, HostSound::Muted(_)));
        sound.init().expect("init");
        sound.set_volume(0.5).expect("volume");
        sound.shutdown().expect("shutdown");
    }
}
