//! The room registry: a sparse, growable slot array of live rooms.
//!
//! Slots vacate lazily: an idle room (no members, nobody travelling in)
//! is only destroyed when a scan for a free slot passes over it, and its
//! slot is reused on the spot. The array grows by a fixed step and only
//! when every slot — reclaimed ones included — holds a usable room.

use std::sync::Arc;

use crate::{Payload, ResultsLog, RoomCell, RoomError, RoomModule, RoomRef};

/// Initial slot count, also the growth step.
pub const ROOMS_GROWTH_STEP: usize = 4;

/// Hard maximum of simultaneous rooms.
pub const MAX_ROOMS: usize = 16 * ROOMS_GROWTH_STEP;

/// Owns the set of live game rooms and hands out references to them.
pub struct RoomRegistry {
    slots: Vec<Option<RoomRef>>,
    log: ResultsLog,
}

impl RoomRegistry {
    /// Creates an empty registry whose rooms will share `log`.
    pub fn new(log: ResultsLog) -> Self {
        Self {
            slots: (0..ROOMS_GROWTH_STEP).map(|_| None).collect(),
            log,
        }
    }

    /// Creates a room bound to `module` in the first usable slot.
    ///
    /// The room's name is the module name plus the slot index (`fool0`).
    /// Scanning reclaims idle rooms it passes; their slots are reused
    /// immediately, so the array grows only when genuinely full.
    ///
    /// # Errors
    /// [`RoomError::RegistryFull`] at the hard maximum, or whatever the
    /// module's `init_room` returns.
    pub fn create(
        &mut self,
        module: Arc<dyn RoomModule>,
        payload: Payload,
    ) -> Result<RoomRef, RoomError> {
        let slot = match self.claim_slot() {
            Some(slot) => slot,
            None => return Err(RoomError::RegistryFull(MAX_ROOMS)),
        };

        let name = format!("{}{}", module.name(), slot);
        let room = RoomCell::create(name, module, payload, self.log.clone())?;
        self.slots[slot] = Some(Arc::clone(&room));
        Ok(room)
    }

    /// Finds the first usable slot index, reclaiming idle rooms along the
    /// way and growing the array if needed.
    fn claim_slot(&mut self) -> Option<usize> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            match slot {
                None => return Some(i),
                Some(room) if room.is_idle() => {
                    room.destroy();
                    *slot = None;
                    return Some(i);
                }
                Some(_) => {}
            }
        }

        if self.slots.len() >= MAX_ROOMS {
            return None;
        }
        let first_new = self.slots.len();
        let grown = (first_new + ROOMS_GROWTH_STEP).min(MAX_ROOMS);
        tracing::debug!(slots = grown, "registry grown");
        self.slots.resize_with(grown, || None);
        Some(first_new)
    }

    /// Looks a room up by its exact name. Linear scan; the registry is
    /// small by construction.
    pub fn find(&self, name: &str) -> Option<RoomRef> {
        self.slots
            .iter()
            .flatten()
            .find(|room| room.name() == name)
            .cloned()
    }

    /// Iterates over the live rooms, for directory listings.
    pub fn rooms(&self) -> impl Iterator<Item = &RoomRef> {
        self.slots.iter().flatten()
    }

    /// Current slot-array size (grows in [`ROOMS_GROWTH_STEP`] steps).
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}
