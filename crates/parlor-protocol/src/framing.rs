//! The inbound line accumulator.
//!
//! A [`LineBuffer`] sits between the socket and the command dispatcher.
//! Reads land in its spare tail; [`LineBuffer::next_line`] carves off one
//! complete command at a time, however the bytes were split across reads.

use crate::FramingError;

/// Capacity of the per-session input accumulator.
///
/// A single command line (terminator included) must fit in this many bytes;
/// anything longer is treated as a protocol violation.
pub const MAX_LINE_BYTES: usize = 1024;

/// Fixed-capacity accumulator that turns a byte stream into command lines.
///
/// Usage pattern per reactor iteration: read into [`spare_mut`], record the
/// read length with [`commit`], then drain complete lines with
/// [`next_line`]. Bytes after the first terminator stay buffered, in order,
/// for later calls.
///
/// [`spare_mut`]: LineBuffer::spare_mut
/// [`commit`]: LineBuffer::commit
/// [`next_line`]: LineBuffer::next_line
pub struct LineBuffer {
    buf: Box<[u8]>,
    used: usize,
}

impl LineBuffer {
    /// Creates an accumulator with the default [`MAX_LINE_BYTES`] capacity.
    pub fn new() -> Self {
        Self::with_capacity(MAX_LINE_BYTES)
    }

    /// Creates an accumulator with a custom capacity (useful in tests).
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "line buffer capacity must be non-zero");
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
        }
    }

    /// The unfilled tail of the accumulator, to read into.
    ///
    /// Empty exactly when the buffer is full; callers must not attempt a
    /// read in that state (a zero-length read is indistinguishable from a
    /// closed connection).
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.used..]
    }

    /// Records that `n` bytes were read into [`spare_mut`](Self::spare_mut).
    pub fn commit(&mut self, n: usize) {
        assert!(self.used + n <= self.buf.len(), "commit past buffer end");
        self.used += n;
    }

    /// Returns `true` when no further bytes can be accepted.
    pub fn is_full(&self) -> bool {
        self.used == self.buf.len()
    }

    /// Number of buffered bytes not yet consumed.
    pub fn len(&self) -> usize {
        self.used
    }

    /// Returns `true` when no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Extracts the first complete line, if any.
    ///
    /// The returned line has the `\n` terminator and at most one trailing
    /// `\r` stripped; an empty line is a valid zero-length command. The
    /// consumed bytes are compacted away, preserving whatever follows the
    /// terminator.
    ///
    /// # Errors
    /// [`FramingError::LineTooLong`] when the buffer is full and contains
    /// no terminator. The buffered bytes are left untouched; the caller is
    /// expected to drop the session.
    pub fn next_line(&mut self) -> Result<Option<String>, FramingError> {
        let Some(pos) = self.buf[..self.used].iter().position(|&b| b == b'\n') else {
            if self.is_full() {
                return Err(FramingError::LineTooLong(self.buf.len()));
            }
            return Ok(None);
        };

        let end = if pos > 0 && self.buf[pos - 1] == b'\r' {
            pos - 1
        } else {
            pos
        };
        let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();

        // Compact: everything after the terminator moves to the front.
        self.buf.copy_within(pos + 1..self.used, 0);
        self.used -= pos + 1;

        Ok(Some(line))
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
