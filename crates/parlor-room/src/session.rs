//! Per-session identity and the staged-effects interface.
//!
//! Module code never touches a socket. The only session mutations it may
//! request are recorded on the [`SessionHandle`] — a single outbound
//! message, a room switch, or a quit — and the connection driver applies
//! them in a fixed order between I/O steps. Staging is how a module's
//! synchronous, run-to-completion processing composes with non-blocking
//! output: nothing is written until the module returns.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::RoomRef;

/// Opaque identifier for one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a new `SessionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// The effects a module may stage on a session.
///
/// [`SessionHandle::next_effect`] hands them out one at a time, in the
/// order the driver must apply them: drain output first, then quit, then
/// switch rooms. Quit deliberately outranks a staged switch — a session
/// that asked to leave is gone, not migrated.
#[derive(Debug)]
pub enum SessionEffect {
    /// Write this blob to the socket.
    Flush(Vec<u8>),
    /// Tear the session down (output already drained).
    Quit,
    /// Move the session into the given room (output already drained).
    Switch(RoomRef),
}

#[derive(Default)]
struct Effects {
    outbound: Option<Vec<u8>>,
    next_room: Option<RoomRef>,
    quit: bool,
}

/// Shared per-session record: identity, display name, staged effects.
///
/// The handle outlives room switches — the display name set at login
/// carries over, while the module-owned session state (held by the room's
/// roster) is destroyed and recreated on every switch.
pub struct SessionHandle {
    id: SessionId,
    name: Mutex<Option<String>>,
    effects: Mutex<Effects>,
    wake: Notify,
}

impl SessionHandle {
    /// Creates the handle for a freshly accepted connection.
    pub fn new(id: SessionId) -> Arc<Self> {
        Arc::new(Self {
            id,
            name: Mutex::new(None),
            effects: Mutex::new(Effects::default()),
            wake: Notify::new(),
        })
    }

    /// The session's connection identity.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The user-chosen display name, absent until login completes.
    pub fn name(&self) -> Option<String> {
        self.name.lock().clone()
    }

    /// Sets (or replaces) the display name.
    pub fn set_name(&self, name: &str) {
        *self.name.lock() = Some(name.to_owned());
    }

    /// Stages an outbound message, replacing any unsent one.
    ///
    /// Replacement (not queueing) is the contract: output is at most one
    /// staged message, and modules are expected to compose a full response
    /// before posting it.
    pub fn post_outbound(&self, message: impl Into<Vec<u8>>) {
        self.effects.lock().outbound = Some(message.into());
        self.wake.notify_one();
    }

    /// Returns `true` if an outbound message is staged and unsent.
    pub fn has_outbound(&self) -> bool {
        self.effects.lock().outbound.is_some()
    }

    /// Stages a migration into `target`, replacing any staged one.
    ///
    /// The target is informed of the inbound session so the registry's
    /// lazy reclamation never destroys a room somebody is still travelling
    /// to (the traveller is not a roster member until it arrives).
    pub fn request_room_switch(&self, target: RoomRef) {
        target.add_inbound();
        let mut fx = self.effects.lock();
        if let Some(old) = fx.next_room.replace(target) {
            old.sub_inbound();
        }
        drop(fx);
        self.wake.notify_one();
    }

    /// Stages session teardown. The staged outbound message, if any,
    /// still drains before the socket closes.
    pub fn request_quit(&self) {
        self.effects.lock().quit = true;
        self.wake.notify_one();
    }

    /// Takes the next staged effect to apply, if any.
    ///
    /// `Flush` and `Switch` are consumed; `Quit` is sticky. At most one of
    /// the three is returned per call so the driver re-polls after every
    /// application — a flushed message may have been quit's last words, a
    /// switch may immediately stage the new room's prompt.
    pub fn next_effect(&self) -> Option<SessionEffect> {
        let mut fx = self.effects.lock();
        if let Some(buf) = fx.outbound.take() {
            return Some(SessionEffect::Flush(buf));
        }
        if fx.quit {
            return Some(SessionEffect::Quit);
        }
        if let Some(room) = fx.next_room.take() {
            return Some(SessionEffect::Switch(room));
        }
        None
    }

    /// Drops all staged effects on final teardown, releasing any inbound
    /// claim held on a switch target.
    pub fn discard_effects(&self) {
        let mut fx = self.effects.lock();
        fx.outbound = None;
        fx.quit = true;
        if let Some(room) = fx.next_room.take() {
            room.sub_inbound();
        }
    }

    /// Resolves once an effect has been staged since the last poll.
    ///
    /// Used by the connection driver to wake from its read wait when
    /// another session's broadcast posts output here.
    pub async fn staged(&self) {
        self.wake.notified().await;
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("name", &self.name.lock())
            .finish_non_exhaustive()
    }
}
