use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use vbam_phone_core::session::{GameStore, StoreError};

use crate::frame_clock::FrameCounter;

/// Save files next to the ROM: `<stem>.sav` for SRAM, `<stem><slot>.sgm` for
/// save states.
///
/// With the engine external, the persisted payload is the frame counter.
pub struct DirStore {
    dir: PathBuf,
    stem: String,
    frames: Arc<FrameCounter>,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>, frames: Arc<FrameCounter>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            frames,
        }
    }

    pub fn sram_path(&self) -> PathBuf {
        self.dir.join(format!("{}.sav", self.stem))
    }

    pub fn state_path(&self, slot: u8) -> PathBuf {
        self.dir.join(format!("{}{slot}.sgm", self.stem))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(format!("{}.snap", self.stem))
    }

    fn write_frames(&self, path: &Path) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(path, self.frames.get().to_le_bytes())?;
        debug!("wrote {}", path.display());
        Ok(())
    }
}

impl GameStore for DirStore {
    fn save_sram(&mut self) -> Result<(), StoreError> {
        self.write_frames(&self.sram_path())
    }

    fn save_state(&mut self, slot: u8) -> Result<(), StoreError> {
        self.write_frames(&self.state_path(slot))
    }

    fn load_state(&mut self, slot: u8) -> Result<(), StoreError> {
        let bytes = fs::read(self.state_path(slot))?;
        let raw: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Engine(format!("slot {slot} is not a save state")))?;
        self.frames.set(u64::from_le_bytes(raw));
        Ok(())
    }

    fn reset(&mut self) -> Result<(), StoreError> {
        self.frames.set(0);
        Ok(())
    }

    fn snapshot(&mut self) -> Result<(), StoreError> {
        self.write_frames(&self.snapshot_path())
    }
}
