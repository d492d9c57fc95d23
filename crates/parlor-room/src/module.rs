//! The [`RoomModule`] trait — the contract every pluggable room module
//! implements.
//!
//! The framework is the only caller: it invokes these operations at the
//! right times and modules never call each other. All operations run under
//! the room's lock and must complete without blocking; a module talks back
//! exclusively through room state and the session's staged effects.

use std::any::Any;
use std::sync::Arc;

use crate::{Room, RoomError, SessionHandle};

/// Module-defined data handed to `init_room` at creation time.
///
/// Each module downcasts to its own payload type: the hub receives its
/// credential-file path and game catalog, a game room receives a
/// back-reference to the hub for "return on finish" flows.
pub type Payload = Box<dyn Any + Send>;

/// A pluggable room behavior: the hub, a card game, a puzzle.
///
/// One module instance may back many rooms; all per-room data lives in
/// [`Room::state`] and all per-session data in the roster's
/// [`Member::state`](crate::Member::state), both opaque to the framework.
///
/// Roster management follows the module: `init_session` either admits the
/// session (pushes a [`Member`](crate::Member) with fresh state) or
/// bounces it by staging a switch or a quit without pushing;
/// `deinit_session` undoes the admission. The framework guarantees that
/// `deinit_session` runs before the member record is discarded and that
/// `process_line` calls for one session never interleave.
pub trait RoomModule: Send + Sync + 'static {
    /// Short type name used as the prefix of generated room names
    /// (`fool0`, `sudoku3`, ...).
    fn name(&self) -> &'static str;

    /// Sets up a fresh room: validate `payload`, set the admission
    /// capacity, install the module's room state.
    fn init_room(&self, room: &mut Room, payload: Payload) -> Result<(), RoomError>;

    /// Releases room-level resources. Most modules have nothing to do
    /// beyond dropping state, which happens regardless.
    fn deinit_room(&self, room: &mut Room) {
        let _ = room;
    }

    /// A session arrived: admit it (push a member, send the prompt) or
    /// bounce it (stage a switch back whence it came, or a quit).
    fn init_session(&self, room: &mut Room, handle: &Arc<SessionHandle>);

    /// A session is leaving — by disconnect, staged quit, or migration.
    ///
    /// Runs before the member record is discarded, so the module may react
    /// to the departure (e.g. end a game the session was playing in). The
    /// default removes the session's roster entry, which suffices for
    /// modules without departure bookkeeping.
    fn deinit_session(&self, room: &mut Room, handle: &Arc<SessionHandle>) {
        if let Some(idx) = room.member_index(handle.id()) {
            room.remove_member(idx);
        }
    }

    /// One trimmed command line from an admitted session. The line never
    /// contains its terminator; a zero-length line is a valid command
    /// ("press ENTER" semantics).
    fn process_line(&self, room: &mut Room, handle: &Arc<SessionHandle>, line: &str);

    /// Whether new sessions may currently join. Consulted by directory
    /// listings and the hub's `join` command.
    fn is_available(&self, room: &Room) -> bool;
}
