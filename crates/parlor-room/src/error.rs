//! Error types for the room layer.

/// Errors that can occur during room creation and registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Every registry slot holds a non-empty room and the hard maximum is
    /// reached. Reported to the requesting user by the module, never fatal.
    #[error("room registry is at capacity ({0} rooms)")]
    RegistryFull(usize),

    /// The payload handed to `init_room` was not the type the module
    /// expects. This is a wiring mistake, caught at room creation.
    #[error("invalid room payload: expected {0}")]
    InvalidPayload(&'static str),

    /// An I/O failure while a module touched its backing files (e.g. the
    /// hub validating its credential file at startup).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
