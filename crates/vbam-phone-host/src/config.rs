use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use vbam_phone_core::session::{DEFAULT_DISCONNECT_TIMEOUT, SessionOptions};

/// GBA refresh rate.
pub const DEFAULT_FRAME_RATE: f64 = 59.7275;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct HostConfig {
    pub sound_enabled: bool,
    pub volume: f32,
    pub auto_increment_savestates: bool,
    pub manual_snapshots: bool,
    pub disconnect_timeout_ms: u64,
    pub frame_rate: f64,
    /// Where save states and SRAM go; defaults to the ROM's folder.
    pub save_dir: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            volume: 1.0,
            auto_increment_savestates: false,
            manual_snapshots: false,
            disconnect_timeout_ms: DEFAULT_DISCONNECT_TIMEOUT.as_millis() as u64,
            frame_rate: DEFAULT_FRAME_RATE,
            save_dir: None,
        }
    }
}

impl HostConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            auto_increment_savestates: self.auto_increment_savestates,
            manual_snapshots: self.manual_snapshots,
            disconnect_timeout: Duration::from_millis(self.disconnect_timeout_ms),
        }
    }

    /// Frame rate used for pacing, falling back to the GBA rate on nonsense.
    pub fn effective_frame_rate(&self) -> f64 {
        if self.frame_rate.is_finite() && self.frame_rate > 0.0 {
            self.frame_rate
        } else {
            DEFAULT_FRAME_RATE
        }
    }
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("vbam-phone").join("host.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("vbam-phone").join("host.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("vbam-phone")
            .join("host.toml");
    }

    PathBuf::from("host.toml")
}

pub fn load_from_file(path: &Path) -> HostConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return HostConfig::default(),
    };

    match toml::from_str::<HostConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse host config {}: {e}; using defaults",
                path.display()
            );
            HostConfig::default()
        }
    }
}

pub fn save_to_file(path: &Path, cfg: &HostConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let text = toml::to_string_pretty(cfg).map_err(std::io::Error::other)?;
    std::fs::write(path, text)
}
