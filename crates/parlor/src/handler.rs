//! Per-connection driver: the session's half of the reactor.
//!
//! Each accepted connection runs this loop in its own task. One iteration
//! applies at most one staged effect, dispatches at most one buffered
//! command line, or performs one socket read — in that order. The
//! ordering carries the session invariants:
//!
//! - output drains before anything else happens, so a staged quit or room
//!   switch never cuts off the message that announced it;
//! - teardown outranks migration — a session that died mid-write is
//!   never moved into another room;
//! - no read happens while an effect is pending, which is the server's
//!   backpressure: a client that won't drain its output gets no further
//!   input processed;
//! - line N+1 is never dispatched before line N's staged effects have
//!   been applied.
//!
//! Waiting couples the socket with the session's wakeup signal: a chat
//! broadcast from another session staging output here interrupts the read
//! wait so the message goes out immediately.

use std::sync::Arc;

use parlor_protocol::{FramingError, LineBuffer, LINE_TOO_LONG_MSG};
use parlor_room::{RoomRef, SessionEffect, SessionHandle};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::server::ServerState;

/// Drives one session from attachment to teardown.
pub(crate) async fn drive(
    mut stream: TcpStream,
    handle: Arc<SessionHandle>,
    mut room: RoomRef,
    state: Arc<ServerState>,
) {
    let mut input = LineBuffer::new();

    loop {
        match handle.next_effect() {
            Some(SessionEffect::Flush(message)) => {
                if let Err(e) = stream.write_all(&message).await {
                    tracing::debug!(session = %handle.id(), error = %e, "write failed");
                    break;
                }
                continue;
            }
            Some(SessionEffect::Quit) => break,
            Some(SessionEffect::Switch(target)) => {
                room.deinit_session(&handle);
                tracing::info!(
                    session = %handle.id(),
                    from = %room.name(),
                    to = %target.name(),
                    "session switched rooms"
                );
                room = target;
                room.init_session(&handle);
                room.sub_inbound();
                continue;
            }
            None => {}
        }

        match input.next_line() {
            Ok(Some(line)) => {
                room.process_line(&handle, &line);
                continue;
            }
            Ok(None) => {}
            Err(FramingError::LineTooLong(_)) => {
                // Protocol violation: fixed reaction, no module dispatch.
                // The quit is staged (not an outright kill) so the error
                // message still drains first.
                handle.post_outbound(LINE_TOO_LONG_MSG);
                handle.request_quit();
                continue;
            }
        }

        tokio::select! {
            result = stream.read(input.spare_mut()) => match result {
                Ok(0) => break,
                Ok(n) => input.commit(n),
                Err(e) => {
                    tracing::debug!(session = %handle.id(), error = %e, "read failed");
                    break;
                }
            },
            () = handle.staged() => {}
        }
    }

    // Teardown: the room sees the departure before the record goes away,
    // then the session's name claim is released wherever it died.
    room.deinit_session(&handle);
    handle.discard_effects();
    state.names.release(handle.id());
    tracing::info!(session = %handle.id(), room = %room.name(), "session closed");
}
