//! Room state and the shared room cell.
//!
//! A [`RoomCell`] is the shareable unit: immutable identity (name, module)
//! plus the mutable [`Room`] behind a lock. Connection drivers, the hub's
//! registry, and switch targets all hold [`RoomRef`]s to it.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::{Chat, Payload, ResultsLog, RoomError, RoomModule, SessionHandle, SessionId};

/// Shared reference to a live room.
pub type RoomRef = Arc<RoomCell>;

/// One session's entry in a room's roster.
///
/// Owns the module's per-session state for the duration of the membership;
/// the state is dropped with the entry on departure and never carried to
/// another room.
pub struct Member {
    /// The session this entry belongs to.
    pub handle: Arc<SessionHandle>,
    /// Whether the session currently views the room's chat rather than the
    /// module's own screen. Broadcasts go only to members with this set.
    pub in_chat: bool,
    /// Module-owned per-session state, opaque to the framework.
    pub state: Box<dyn Any + Send>,
}

impl Member {
    /// The member's display name, if login has completed.
    pub fn name(&self) -> Option<String> {
        self.handle.name()
    }
}

/// The mutable half of a room: roster, module state, chat.
///
/// Handed to module callbacks as `&mut Room`; fields are public because
/// the module owns the semantics and the framework only the shape.
pub struct Room {
    cell: Weak<RoomCell>,
    /// Current members, in admission order. Order is meaningful — modules
    /// address players by index — and removal compacts, never leaves gaps.
    pub members: Vec<Member>,
    /// Admission capacity; the roster never exceeds it. `usize::MAX` for
    /// rooms that admit anyone (the hub).
    pub capacity: usize,
    /// Module-owned room state, installed by `init_room`.
    pub state: Box<dyn Any + Send>,
    /// This room's chat broadcaster and bounded history.
    pub chat: Chat,
    /// Shared sink for game results.
    pub log: ResultsLog,
}

impl Room {
    fn new(cell: Weak<RoomCell>, log: ResultsLog) -> Self {
        Self {
            cell,
            members: Vec::new(),
            capacity: 0,
            state: Box::new(()),
            chat: Chat::new(),
            log,
        }
    }

    /// The cell this room lives in, for payloads and switch targets.
    ///
    /// Note: module code already runs under this room's lock; calling a
    /// lock-taking [`RoomCell`] method on the returned ref from inside a
    /// callback of the *same* room will deadlock. Other rooms are fine.
    pub fn cell(&self) -> RoomRef {
        self.cell.upgrade().expect("room cell outlives its room")
    }

    /// The room's name.
    pub fn name(&self) -> String {
        self.cell().name().to_owned()
    }

    /// Index of the member belonging to `id`, if admitted.
    pub fn member_index(&self, id: SessionId) -> Option<usize> {
        self.members.iter().position(|m| m.handle.id() == id)
    }

    /// Admits a session with its fresh module state.
    pub fn add_member(&mut self, handle: Arc<SessionHandle>, state: Box<dyn Any + Send>) {
        debug_assert!(self.members.len() < self.capacity, "roster over capacity");
        self.members.push(Member {
            handle,
            in_chat: false,
            state,
        });
    }

    /// Removes the member at `idx`, shifting later members down.
    pub fn remove_member(&mut self, idx: usize) -> Member {
        self.members.remove(idx)
    }
}

/// A live room: identity, module binding, and the locked [`Room`] state.
///
/// Created by [`RoomCell::create`], shared as [`RoomRef`]. The lock is
/// held for the duration of each module callback and never across an
/// await, which is what serializes all activity within one room.
pub struct RoomCell {
    name: String,
    module: Arc<dyn RoomModule>,
    /// Sessions that have a staged switch targeting this room but have not
    /// arrived yet. Keeps lazy reclamation away from rooms in use.
    inbound: AtomicUsize,
    room: Mutex<Room>,
}

impl RoomCell {
    /// Creates a room bound to `module` and runs its `init_room`.
    pub fn create(
        name: impl Into<String>,
        module: Arc<dyn RoomModule>,
        payload: Payload,
        log: ResultsLog,
    ) -> Result<RoomRef, RoomError> {
        let cell = Arc::new_cyclic(|weak| RoomCell {
            name: name.into(),
            module: Arc::clone(&module),
            inbound: AtomicUsize::new(0),
            room: Mutex::new(Room::new(weak.clone(), log)),
        });
        cell.module.init_room(&mut cell.room.lock(), payload)?;
        tracing::info!(room = %cell.name, module = cell.module.name(), "room created");
        Ok(cell)
    }

    /// The room's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bound module.
    pub fn module(&self) -> &Arc<dyn RoomModule> {
        &self.module
    }

    /// Locks the room state directly. Prefer the dispatch helpers below;
    /// this exists for the registry and for tests.
    pub fn room(&self) -> MutexGuard<'_, Room> {
        self.room.lock()
    }

    /// Runs the module's `init_session` for an arriving session.
    pub fn init_session(&self, handle: &Arc<SessionHandle>) {
        self.module.init_session(&mut self.room.lock(), handle);
    }

    /// Runs the module's `deinit_session` for a departing session.
    pub fn deinit_session(&self, handle: &Arc<SessionHandle>) {
        self.module.deinit_session(&mut self.room.lock(), handle);
    }

    /// Dispatches one command line to the module.
    pub fn process_line(&self, handle: &Arc<SessionHandle>, line: &str) {
        self.module.process_line(&mut self.room.lock(), handle, line);
    }

    /// Whether new sessions may currently join.
    pub fn is_available(&self) -> bool {
        self.module.is_available(&self.room.lock())
    }

    /// Current roster size.
    pub fn member_count(&self) -> usize {
        self.room.lock().members.len()
    }

    /// Roster size and admission capacity, read under one lock.
    pub fn occupancy(&self) -> (usize, usize) {
        let room = self.room.lock();
        (room.members.len(), room.capacity)
    }

    /// Records a session travelling here via a staged switch.
    pub fn add_inbound(&self) {
        self.inbound.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops an inbound claim — the session arrived or gave up.
    pub fn sub_inbound(&self) {
        self.inbound.fetch_sub(1, Ordering::Relaxed);
    }

    /// `true` when the room has no members and nobody on the way — the
    /// registry may reclaim it.
    pub fn is_idle(&self) -> bool {
        self.inbound.load(Ordering::Relaxed) == 0 && self.member_count() == 0
    }

    /// Runs the module's `deinit_room` prior to dropping the last refs.
    pub fn destroy(&self) {
        self.module.deinit_room(&mut self.room.lock());
        tracing::info!(room = %self.name, "room destroyed");
    }
}

impl std::fmt::Debug for RoomCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomCell")
            .field("name", &self.name)
            .field("module", &self.module.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::SessionEffect;

    use super::*;

    struct Closet;

    impl RoomModule for Closet {
        fn name(&self) -> &'static str {
            "closet"
        }

        fn init_room(&self, room: &mut Room, _payload: Payload) -> Result<(), RoomError> {
            room.capacity = 2;
            room.state = Box::new(0u32);
            Ok(())
        }

        fn init_session(&self, room: &mut Room, handle: &Arc<SessionHandle>) {
            room.add_member(Arc::clone(handle), Box::new(()));
        }

        fn process_line(&self, room: &mut Room, _handle: &Arc<SessionHandle>, _line: &str) {
            *room.state.downcast_mut::<u32>().expect("closet state") += 1;
        }

        fn is_available(&self, room: &Room) -> bool {
            room.members.len() < room.capacity
        }
    }

    fn cell() -> RoomRef {
        RoomCell::create("closet0", Arc::new(Closet), Box::new(()), ResultsLog::disabled())
            .expect("closet rooms always build")
    }

    fn handle(id: u64) -> Arc<SessionHandle> {
        SessionHandle::new(SessionId::new(id))
    }

    #[test]
    fn test_create_runs_init_room() {
        let cell = cell();
        assert_eq!(cell.occupancy(), (0, 2));
        assert!(cell.is_available());
    }

    #[test]
    fn test_membership_lifecycle() {
        let cell = cell();
        let h1 = handle(1);
        let h2 = handle(2);

        cell.init_session(&h1);
        cell.init_session(&h2);
        assert_eq!(cell.member_count(), 2);
        assert!(!cell.is_available());

        cell.deinit_session(&h1);
        assert_eq!(cell.member_count(), 1);
        // Compaction: the remaining member is now index 0.
        assert_eq!(cell.room().member_index(h2.id()), Some(0));
    }

    #[test]
    fn test_deinit_session_for_stranger_is_noop() {
        let cell = cell();
        cell.init_session(&handle(1));
        cell.deinit_session(&handle(99));
        assert_eq!(cell.member_count(), 1);
    }

    #[test]
    fn test_inbound_claims_block_idleness() {
        let cell = cell();
        assert!(cell.is_idle());

        let h = handle(1);
        h.request_room_switch(Arc::clone(&cell));
        assert!(!cell.is_idle());

        // Arrival: the claim converts into membership.
        match h.next_effect() {
            Some(SessionEffect::Switch(target)) => {
                target.init_session(&h);
                target.sub_inbound();
            }
            other => panic!("expected Switch, got {other:?}"),
        }
        assert!(!cell.is_idle());
        assert_eq!(cell.member_count(), 1);
    }

    #[test]
    fn test_replaced_switch_releases_inbound_claim() {
        let a = cell();
        let b = cell();
        let h = handle(1);

        h.request_room_switch(Arc::clone(&a));
        h.request_room_switch(Arc::clone(&b));
        assert!(a.is_idle(), "replaced target loses its claim");
        assert!(!b.is_idle());

        h.discard_effects();
        assert!(b.is_idle(), "teardown releases the claim");
    }

    #[test]
    fn test_room_name_reaches_module_side() {
        let cell = cell();
        assert_eq!(cell.room().name(), "closet0");
    }
}
