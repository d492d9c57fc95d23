//! Error types for the framing layer.

/// Errors that can occur while framing the inbound byte stream.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// The accumulator filled up without ever containing a line terminator.
    ///
    /// This is a protocol violation by the client, not an I/O failure —
    /// the caller is expected to answer with a fixed error message and
    /// drop the session rather than retry.
    #[error("input line exceeds {0} bytes with no terminator")]
    LineTooLong(usize),
}
