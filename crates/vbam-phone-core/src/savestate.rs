/// Number of save-state slots, the last of which is reserved for autosave.
pub const MAX_SAVESTATE_SLOTS: u8 = 10;
pub const AUTOSAVE_SLOT: u8 = MAX_SAVESTATE_SLOTS - 1;

/// Current save and load slot selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveSlots {
    save: u8,
    load: u8,
}

impl SaveSlots {
    pub fn save_slot(&self) -> u8 {
        self.save
    }

    pub fn load_slot(&self) -> u8 {
        self.load
    }

    /// Selects `slot` (wrapped into range) for both saving and loading.
    ///
    /// Returns `(new, old)` save slots.
    pub fn select(&mut self, slot: u8) -> (u8, u8) {
        let old = self.save;
        self.save = slot % MAX_SAVESTATE_SLOTS;
        self.load = self.save;
        (self.save, old)
    }

    /// Moves to the next manual slot after a save, leaving the load slot on
    /// the state just written. The autosave slot is never picked.
    ///
    /// Returns `(new, old)` save slots.
    pub fn advance_after_save(&mut self) -> (u8, u8) {
        let old = self.save;
        self.save = if old == AUTOSAVE_SLOT {
            0
        } else {
            (old + 1) % AUTOSAVE_SLOT
        };
        self.load = old;
        (self.save, old)
    }

    /// Runs `f` with the save slot switched to [`AUTOSAVE_SLOT`], restoring
    /// the previous selection afterwards.
    pub fn with_autosave<T>(&mut self, f: impl FnOnce(u8) -> T) -> T {
        let previous = self.save;
        self.save = AUTOSAVE_SLOT;
        let result = f(self.save);
        self.save = previous;
        result
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_wraps_and_moves_load_slot() {
        let mut slots = SaveSlots::default();
        assert_eq!(slots.select(3), (3, 0));
        assert_eq!(slots.load_slot(), 3);
        assert_eq!(slots.select(12), (2, 3));
        assert_eq!(slots.save_slot(), 2);
        assert_eq!(slots.load_slot(), 2);
    }

    #[test]
    fn advance_skips_autosave_slot() {
        let mut slots = SaveSlots::default();
        slots.select(7);
        assert_eq!(slots.advance_after_save(), (8, 7));
        assert_eq!(slots.load_slot(), 7);
        assert_eq!(slots.advance_after_save(), (0, 8));
        assert_eq!(slots.load_slot(), 8);
    }

    #[test]
    fn advance_from_autosave_restarts_at_zero() {
        let mut slots = SaveSlots::default();
        slots.select(AUTOSAVE_SLOT);
        assert_eq!(slots.advance_after_save(), (0, AUTOSAVE_SLOT));
        assert_eq!(slots.load_slot(), AUTOSAVE_SLOT);
    }

    #[test]
    fn with_autosave_restores_selection() {
        let mut slots = SaveSlots::default();
        slots.select(4);
        let used = slots.with_autosave(|slot| slot);
        assert_eq!(used, AUTOSAVE_SLOT);
        assert_eq!(slots.save_slot(), 4);
        assert_eq!(slots.load_slot(), 4);
    }
}
