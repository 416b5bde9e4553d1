use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::{info, warn};
use vbam_phone_core::{EmulationStep, PixelFormat, StepError};

use crate::config::DEFAULT_FRAME_RATE;

/// Frame counter shared between the stepper, the save store and `main`.
#[derive(Debug, Default)]
pub struct FrameCounter(AtomicU64);

impl FrameCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, frames: u64) {
        self.0.store(frames, Ordering::Release);
    }

    fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Step callback for the headless host: one step is one frame, paced to
/// wall-clock time.
///
/// The real engine plugs in here; this stand-in only keeps time.
pub struct FramePacer {
    frames: Arc<FrameCounter>,
    frame_time: Duration,
    next_frame: Option<Instant>,
}

impl FramePacer {
    pub fn new(frames: Arc<FrameCounter>, frame_rate: f64) -> Self {
        let frame_time = Duration::try_from_secs_f64(1.0 / frame_rate).unwrap_or_else(|_| {
            warn!("frame rate {frame_rate} has no usable frame time; using {DEFAULT_FRAME_RATE}");
            Duration::from_secs_f64(1.0 / DEFAULT_FRAME_RATE)
        });
        Self {
            frames,
            frame_time,
            next_frame: None,
        }
    }

    pub fn frame_time(&self) -> Duration {
        self.frame_time
    }
}

impl EmulationStep for FramePacer {
    fn step(&mut self) -> Result<(), StepError> {
        let now = Instant::now();
        let target = *self.next_frame.get_or_insert(now + self.frame_time);
        if target > now {
            std::thread::sleep(target - now);
            self.next_frame = Some(target + self.frame_time);
        } else {
            // Fell behind (paused, or the host stalled): don't try to catch up.
            self.next_frame = Some(now + self.frame_time);
        }
        self.frames.advance();
        Ok(())
    }

    fn configure(&mut self, format: &PixelFormat) {
        info!(
            "frame buffer: {} bpp, shifts r{} g{} b{}",
            format.depth, format.red_shift, format.green_shift, format.blue_shift
        );
    }
}
