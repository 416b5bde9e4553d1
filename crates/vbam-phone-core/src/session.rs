//! Surface-attach/detach orchestration on top of the lifecycle controller.
//!
//! A [`Session`] is what the presentation layer talks to: it resumes the
//! controller when a drawing surface appears, and on detach it persists the
//! game (SRAM, autosave, snapshot) before suspending the worker, waiting at
//! most a bounded time so the UI thread never hangs.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossbeam_channel as cb;
use log::{info, warn};
use thiserror::Error;

use crate::error::LifecycleError;
use crate::lifecycle::LifecycleController;
use crate::savestate::{AUTOSAVE_SLOT, MAX_SAVESTATE_SLOTS, SaveSlots};
use crate::scheduler::HostScheduler;

const DISCONNECT_TASK_NAME: &str = "vbam-disconnect";
pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("engine rejected the request: {0}")]
    Engine(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("save data error: {0}")]
    Store(#[from] StoreError),
    #[error("no ROM loaded")]
    NoRom,
    #[error("disconnect did not finish within {0:?}")]
    DisconnectTimedOut(Duration),
}

/// Persistence operations provided by the external engine.
pub trait GameStore: Send {
    fn save_sram(&mut self) -> Result<(), StoreError>;
    fn save_state(&mut self, slot: u8) -> Result<(), StoreError>;
    fn load_state(&mut self, slot: u8) -> Result<(), StoreError>;
    fn reset(&mut self) -> Result<(), StoreError>;
    /// Captures the current frame for the ROM's library thumbnail.
    fn snapshot(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SlotSelected { new: u8, old: u8 },
    StateSaved { slot: u8, rom: String },
    SnapshotTaken { rom: String },
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub auto_increment_savestates: bool,
    pub manual_snapshots: bool,
    pub disconnect_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_increment_savestates: false,
            manual_snapshots: false,
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
        }
    }
}

struct Inner {
    controller: Arc<LifecycleController>,
    store: Mutex<Box<dyn GameStore>>,
    slots: Mutex<SaveSlots>,
    options: SessionOptions,
    events: cb::Sender<SessionEvent>,
}

impl Inner {
    fn store(&self) -> MutexGuard<'_, Box<dyn GameStore>> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slots(&self) -> MutexGuard<'_, SaveSlots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn rom_name(&self) -> Result<String, SessionError> {
        self.controller
            .rom()
            .map(|rom| rom.name())
            .ok_or(SessionError::NoRom)
    }

    fn persist(&self, rom: &str) -> Result<(), SessionError> {
        self.store().save_sram()?;
        self.slots()
            .with_autosave(|slot| self.store().save_state(slot))?;
        self.emit(SessionEvent::StateSaved {
            slot: AUTOSAVE_SLOT,
            rom: rom.to_owned(),
        });
        Ok(())
    }

    fn run_disconnect(&self) -> Result<(), SessionError> {
        let persisted = match self.controller.rom() {
            Some(rom) => {
                let rom = rom.name();
                self.controller.pause();
                let persisted = self.persist(&rom);
                if let Err(e) = &persisted {
                    warn!("failed to persist {rom} before detach: {e}");
                }
                self.controller.unpause();

                if !self.options.manual_snapshots {
                    match self.store().snapshot() {
                        Ok(()) => self.emit(SessionEvent::SnapshotTaken { rom }),
                        Err(e) => warn!("snapshot failed: {e}"),
                    }
                }
                persisted
            }
            None => Ok(()),
        };

        self.controller.suspend()?;
        persisted
    }
}

/// Drives the controller on behalf of the presentation layer.
pub struct Session {
    inner: Arc<Inner>,
    scheduler: Arc<dyn HostScheduler>,
    events: cb::Receiver<SessionEvent>,
}

impl Session {
    pub fn new(
        controller: Arc<LifecycleController>,
        store: impl GameStore + 'static,
        scheduler: Arc<dyn HostScheduler>,
        options: SessionOptions,
    ) -> Self {
        let (tx, rx) = cb::unbounded();
        Self {
            inner: Arc::new(Inner {
                controller,
                store: Mutex::new(Box::new(store)),
                slots: Mutex::new(SaveSlots::default()),
                options,
                events: tx,
            }),
            scheduler,
            events: rx,
        }
    }

    pub fn controller(&self) -> &Arc<LifecycleController> {
        &self.inner.controller
    }

    /// Receiver for slot/save/snapshot notifications.
    pub fn events(&self) -> cb::Receiver<SessionEvent> {
        self.events.clone()
    }

    pub fn slots(&self) -> SaveSlots {
        *self.inner.slots()
    }

    /// A drawing surface became available.
    pub fn connect(&self) -> Result<(), SessionError> {
        let controller = &self.inner.controller;
        controller.resume()?;
        if controller.is_rom_loaded() {
            controller.start();
            controller.unpause();
        } else {
            self.inner.slots().reset();
        }
        Ok(())
    }

    /// The drawing surface is going away.
    ///
    /// Persistence and suspension run on a background task; this waits at
    /// most the configured timeout for them.
    pub fn disconnect(&self) -> Result<(), SessionError> {
        let timeout = self.inner.options.disconnect_timeout;
        let (tx, rx) = cb::bounded(1);
        let inner = Arc::clone(&self.inner);
        let handle = self
            .scheduler
            .spawn(
                DISCONNECT_TASK_NAME,
                Box::new(move || {
                    let _ = tx.send(inner.run_disconnect());
                }),
            )
            .map_err(LifecycleError::from)?;

        match rx.recv_timeout(timeout) {
            Ok(result) => {
                handle.join();
                info!("session detached");
                result
            }
            Err(cb::RecvTimeoutError::Timeout) => {
                warn!("detach still running after {timeout:?}; continuing without it");
                Err(SessionError::DisconnectTimedOut(timeout))
            }
            Err(cb::RecvTimeoutError::Disconnected) => {
                Err(SessionError::Lifecycle(LifecycleError::TaskLost))
            }
        }
    }

    pub fn select_slot(&self, slot: u8) -> u8 {
        let (new, old) = self.inner.slots().select(slot);
        self.inner.emit(SessionEvent::SlotSelected { new, old });
        new
    }

    /// Saves into the current slot and resumes emulation.
    pub fn save_state(&self) -> Result<u8, SessionError> {
        let rom = self.inner.rom_name()?;
        let slot = self.inner.slots().save_slot();
        self.inner.store().save_state(slot)?;
        self.inner.controller.unpause();
        self.inner.emit(SessionEvent::StateSaved { slot, rom });

        if self.inner.options.auto_increment_savestates {
            let (new, old) = self.inner.slots().advance_after_save();
            self.inner.emit(SessionEvent::SlotSelected { new, old });
        }
        Ok(slot)
    }

    pub fn load_state(&self, slot: u8) -> Result<(), SessionError> {
        if !self.inner.controller.is_rom_loaded() {
            return Err(SessionError::NoRom);
        }
        self.inner.store().load_state(slot % MAX_SAVESTATE_SLOTS)?;
        self.inner.controller.unpause();
        Ok(())
    }

    /// Resets the running game. Returns `false` when no ROM is loaded.
    pub fn reset(&self) -> Result<bool, SessionError> {
        if !self.inner.controller.is_rom_loaded() {
            return Ok(false);
        }
        self.inner.store().reset()?;
        Ok(true)
    }
}
