//! Wire protocol for the parlor server.
//!
//! The protocol is deliberately thin: clients send single lines terminated
//! by `\n` or `\r\n`, the server answers with raw byte blobs that embed
//! their own line breaks. There is no framing beyond the terminator and no
//! length prefixes, so the only real work on this layer is turning an
//! arbitrarily chunked byte stream back into discrete command lines —
//! that's [`LineBuffer`].

mod error;
mod framing;

pub use error::FramingError;
pub use framing::{LineBuffer, MAX_LINE_BYTES};

/// Blob of blank lines prepended to full-screen redraws.
///
/// Terminal clients are assumed to be dumb (`telnet`/`nc`), so "clearing
/// the screen" means scrolling the previous content out of view.
pub const CLEAR_SCREEN: &str = "\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\
                                \r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\
                                \r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\
                                \r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n\r\n";

/// Fixed response sent before disconnecting a client whose input filled the
/// whole accumulator without a single line terminator.
pub const LINE_TOO_LONG_MSG: &str = "ERR: Line was too long\r\n";
