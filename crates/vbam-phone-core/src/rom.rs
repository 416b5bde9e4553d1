use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// The file/folder pair identifying a loaded ROM.
///
/// Both halves live in one value so they can only be set or cleared together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomSource {
    file: PathBuf,
    folder: PathBuf,
}

impl RomSource {
    pub fn new(file: impl Into<PathBuf>, folder: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            folder: folder.into(),
        }
    }

    /// Uses the file's parent directory as the folder.
    pub fn from_file(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let folder = file
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self { file, folder }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// File name without directories, used to label saves and snapshots.
    pub fn name(&self) -> String {
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct RomSlot {
    current: Mutex<Option<RomSource>>,
}

impl RomSlot {
    fn lock(&self) -> MutexGuard<'_, Option<RomSource>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }

    /// Replaces the loaded ROM, returning the previous one.
    pub fn set(&self, rom: RomSource) -> Option<RomSource> {
        self.lock().replace(rom)
    }

    pub fn clear(&self) -> Option<RomSource> {
        self.lock().take()
    }

    pub fn get(&self) -> Option<RomSource> {
        self.lock().clone()
    }
}
