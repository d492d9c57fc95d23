//! Unified error type for the parlor server.

use parlor_room::RoomError;

/// Top-level error covering server startup and room wiring.
///
/// Runtime failures never surface here: a broken connection tears down
/// only its own session, and domain errors are worded by the modules
/// themselves. What remains is startup — binding the listener and
/// building the bootstrap room.
#[derive(Debug, thiserror::Error)]
pub enum ParlorError {
    /// Socket-level failure (bind, listen).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Bootstrap room construction failed (bad payload, credential file).
    #[error(transparent)]
    Room(#[from] RoomError),
}
