//! Rooms and room modules for the parlor server.
//!
//! A *room* is a container of sessions all bound to the same pluggable
//! module instance — the hub, one card table, one puzzle board. This crate
//! owns everything the room layer needs:
//!
//! - the [`RoomModule`] contract that every pluggable module implements,
//!   and the [`Room`]/[`Member`] state the framework hands to it;
//! - the [`SessionHandle`] through which module code stages its only
//!   allowed session mutations (an outbound message, a room switch, a
//!   quit request) for the connection driver to apply;
//! - the [`RoomRegistry`] that places, finds, and lazily reclaims room
//!   instances;
//! - the per-room [`Chat`] broadcaster with its bounded history;
//! - small shared services: the [`NameDirectory`] of logged-in display
//!   names and the append-only [`ResultsLog`].
//!
//! Everything here is synchronous and run-to-completion: module callbacks
//! execute under their room's lock and never await, so no two sessions of
//! the same room ever interleave inside module code.

mod chat;
mod error;
mod log;
mod module;
mod names;
mod registry;
mod room;
mod session;

pub use chat::{Chat, CHAT_HISTORY_LEN, MAX_CHAT_MSG_LEN};
pub use error::RoomError;
pub use log::ResultsLog;
pub use module::{Payload, RoomModule};
pub use names::NameDirectory;
pub use registry::{RoomRegistry, MAX_ROOMS, ROOMS_GROWTH_STEP};
pub use room::{Member, Room, RoomCell, RoomRef};
pub use session::{SessionEffect, SessionHandle, SessionId};
