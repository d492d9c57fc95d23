//! Integration tests for the server core: framing, staged effects,
//! backpressure, and room migration over real sockets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parlor::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

// =========================================================================
// Mock modules
// =========================================================================

/// How many bytes the `big` command stages — enough to overwhelm both
/// socket buffers so the server's write actually blocks on the client.
const BIG_BLOB_LEN: usize = 16 * 1024 * 1024;

/// Bootstrap module that records every dispatched line.
///
/// Commands: `big` stages a huge blob, `bye` stages a goodbye plus quit,
/// anything else echoes.
struct EchoModule {
    seen: Arc<Mutex<Vec<String>>>,
}

impl RoomModule for EchoModule {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn init_room(&self, room: &mut Room, _payload: Payload) -> Result<(), RoomError> {
        room.capacity = 8;
        Ok(())
    }

    fn init_session(&self, room: &mut Room, handle: &Arc<SessionHandle>) {
        room.add_member(Arc::clone(handle), Box::new(()));
    }

    fn process_line(&self, _room: &mut Room, handle: &Arc<SessionHandle>, line: &str) {
        self.seen.lock().unwrap().push(line.to_owned());
        match line {
            "big" => handle.post_outbound(vec![b'x'; BIG_BLOB_LEN]),
            "bye" => {
                handle.post_outbound("farewell\r\n");
                handle.request_quit();
            }
            _ => handle.post_outbound(format!("ok: {line}\r\n")),
        }
    }

    fn is_available(&self, _room: &Room) -> bool {
        true
    }
}

/// Bootstrap module whose `go` command migrates the session into a target
/// room passed as the payload.
struct LobbyModule {
    deinits: Arc<AtomicUsize>,
}

struct LobbyRoom {
    target: RoomRef,
}

impl RoomModule for LobbyModule {
    fn name(&self) -> &'static str {
        "lobby"
    }

    fn init_room(&self, room: &mut Room, payload: Payload) -> Result<(), RoomError> {
        let target = payload
            .downcast::<RoomRef>()
            .map_err(|_| RoomError::InvalidPayload("RoomRef"))?;
        room.capacity = 8;
        room.state = Box::new(LobbyRoom { target: *target });
        Ok(())
    }

    fn init_session(&self, room: &mut Room, handle: &Arc<SessionHandle>) {
        room.add_member(Arc::clone(handle), Box::new(()));
    }

    fn deinit_session(&self, room: &mut Room, handle: &Arc<SessionHandle>) {
        if let Some(idx) = room.member_index(handle.id()) {
            room.remove_member(idx);
            self.deinits.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn process_line(&self, room: &mut Room, handle: &Arc<SessionHandle>, line: &str) {
        if line == "go" {
            let target = {
                let lobby = room.state.downcast_ref::<LobbyRoom>().expect("lobby state");
                Arc::clone(&lobby.target)
            };
            handle.post_outbound("moving on\r\n");
            handle.request_room_switch(target);
        }
    }

    fn is_available(&self, _room: &Room) -> bool {
        true
    }
}

/// Target room for migration tests; greets arrivals and counts them.
struct ArenaModule {
    inits: Arc<AtomicUsize>,
}

impl RoomModule for ArenaModule {
    fn name(&self) -> &'static str {
        "arena"
    }

    fn init_room(&self, room: &mut Room, _payload: Payload) -> Result<(), RoomError> {
        room.capacity = 8;
        Ok(())
    }

    fn init_session(&self, room: &mut Room, handle: &Arc<SessionHandle>) {
        room.add_member(Arc::clone(handle), Box::new(()));
        self.inits.fetch_add(1, Ordering::Relaxed);
        handle.post_outbound("the arena greets you\r\n");
    }

    fn process_line(&self, _room: &mut Room, handle: &Arc<SessionHandle>, line: &str) {
        handle.post_outbound(format!("arena: {line}\r\n"));
    }

    fn is_available(&self, room: &Room) -> bool {
        room.members.len() < room.capacity
    }
}

// =========================================================================
// Helpers
// =========================================================================

/// Starts a server on a random port and returns its address.
async fn start(bootstrap: Arc<dyn RoomModule>, payload: Payload) -> String {
    let server = ParlorServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(bootstrap, payload)
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("bound").to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn start_echo() -> (String, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let addr = start(
        Arc::new(EchoModule {
            seen: Arc::clone(&seen),
        }),
        Box::new(()),
    )
    .await;
    (addr, seen)
}

async fn connect(addr: &str) -> TcpStream {
    TcpStream::connect(addr).await.expect("should connect")
}

async fn send(stream: &mut TcpStream, data: &str) {
    stream.write_all(data.as_bytes()).await.expect("send");
    stream.flush().await.expect("flush");
}

/// Reads until the received text contains `needle`; panics on timeout or
/// disconnect. Returns everything read so far.
async fn recv_until(stream: &mut TcpStream, needle: &str) -> String {
    let mut got = Vec::new();
    timeout(Duration::from_secs(5), async {
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await.expect("recv");
            assert!(n > 0, "connection closed while waiting for {needle:?}");
            got.extend_from_slice(&buf[..n]);
            if String::from_utf8_lossy(&got).contains(needle) {
                break;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}"));
    String::from_utf8_lossy(&got).into_owned()
}

/// Reads until the server closes the connection.
async fn recv_until_eof(stream: &mut TcpStream) -> String {
    let mut got = Vec::new();
    timeout(Duration::from_secs(5), async {
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => got.extend_from_slice(&buf[..n]),
            }
        }
    })
    .await
    .expect("timed out waiting for EOF");
    String::from_utf8_lossy(&got).into_owned()
}

fn seen_lines(seen: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    seen.lock().unwrap().clone()
}

// =========================================================================
// Framing
// =========================================================================

#[tokio::test]
async fn test_lines_dispatch_in_order() {
    let (addr, seen) = start_echo().await;
    let mut client = connect(&addr).await;

    send(&mut client, "cmd1\r\ncmd2\r\n").await;
    recv_until(&mut client, "ok: cmd2").await;

    assert_eq!(seen_lines(&seen), ["cmd1", "cmd2"]);
}

#[tokio::test]
async fn test_framing_survives_arbitrary_chunking() {
    let (addr, seen) = start_echo().await;
    let mut client = connect(&addr).await;

    // The same two commands, dribbled out byte-cluster by byte-cluster.
    for chunk in ["cm", "d1\r", "\ncmd", "2", "\r\n"] {
        send(&mut client, chunk).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    recv_until(&mut client, "ok: cmd2").await;

    assert_eq!(seen_lines(&seen), ["cmd1", "cmd2"]);
}

#[tokio::test]
async fn test_bare_lf_terminates_too() {
    let (addr, seen) = start_echo().await;
    let mut client = connect(&addr).await;

    send(&mut client, "plain\n").await;
    recv_until(&mut client, "ok: plain").await;

    assert_eq!(seen_lines(&seen), ["plain"]);
}

#[tokio::test]
async fn test_empty_line_is_a_command() {
    let (addr, seen) = start_echo().await;
    let mut client = connect(&addr).await;

    send(&mut client, "\r\n").await;
    recv_until(&mut client, "ok: ").await;

    assert_eq!(seen_lines(&seen), [""]);
}

#[tokio::test]
async fn test_too_long_line_reaction() {
    let (addr, seen) = start_echo().await;
    let mut client = connect(&addr).await;

    // Exactly fills the accumulator, never a terminator.
    send(&mut client, &"y".repeat(MAX_LINE_BYTES)).await;
    let got = recv_until_eof(&mut client).await;

    assert!(got.contains("ERR: Line was too long"), "got: {got:?}");
    assert_eq!(
        got.matches("ERR: Line was too long").count(),
        1,
        "reaction fires exactly once"
    );
    assert!(seen_lines(&seen).is_empty(), "nothing reached the module");
}

// =========================================================================
// Staged effects
// =========================================================================

#[tokio::test]
async fn test_quit_drains_staged_message_first() {
    let (addr, seen) = start_echo().await;
    let mut client = connect(&addr).await;

    send(&mut client, "bye\r\n").await;
    let got = recv_until_eof(&mut client).await;

    assert!(got.contains("farewell"), "got: {got:?}");
    assert_eq!(seen_lines(&seen), ["bye"]);
}

#[tokio::test]
async fn test_disconnect_discards_partial_line() {
    let (addr, seen) = start_echo().await;
    let mut client = connect(&addr).await;

    send(&mut client, "finished\r\nhalf a comm").await;
    recv_until(&mut client, "ok: finished").await;
    drop(client);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(seen_lines(&seen), ["finished"], "no partial-line salvage");
}

// =========================================================================
// Backpressure
// =========================================================================

#[tokio::test]
async fn test_pending_output_defers_further_dispatch() {
    let (addr, seen) = start_echo().await;
    let mut client = connect(&addr).await;

    // `big` stages a blob far larger than the kernel will buffer, so the
    // server is stuck mid-flush while `ping` sits in its input buffer.
    send(&mut client, "big\r\nping\r\n").await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        seen_lines(&seen),
        ["big"],
        "second line must wait for the flush"
    );

    // Drain the blob; the server unblocks, dispatches `ping`, and its
    // echo tails the stream. Only the tail is kept — the blob itself is
    // sixteen megabytes of filler.
    let mut tail: Vec<u8> = Vec::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = timeout(Duration::from_secs(10), client.read(&mut buf))
            .await
            .expect("timed out draining blob")
            .expect("read");
        assert!(n > 0, "server closed mid-blob");
        tail.extend_from_slice(&buf[..n]);
        if tail.len() > 64 {
            tail.drain(..tail.len() - 64);
        }
        if tail.ends_with(b"ok: ping\r\n") {
            break;
        }
    }

    assert_eq!(seen_lines(&seen), ["big", "ping"]);
}

// =========================================================================
// Room migration
// =========================================================================

#[tokio::test]
async fn test_room_switch_drains_output_and_runs_lifecycle_once() {
    let deinits = Arc::new(AtomicUsize::new(0));
    let inits = Arc::new(AtomicUsize::new(0));

    let arena = RoomCell::create(
        "arena0",
        Arc::new(ArenaModule {
            inits: Arc::clone(&inits),
        }),
        Box::new(()),
        ResultsLog::disabled(),
    )
    .expect("arena builds");

    let addr = start(
        Arc::new(LobbyModule {
            deinits: Arc::clone(&deinits),
        }),
        Box::new(Arc::clone(&arena)),
    )
    .await;

    let mut client = connect(&addr).await;
    send(&mut client, "go\r\n").await;
    let got = recv_until(&mut client, "the arena greets you").await;

    // The goodbye staged alongside the switch arrives before the new
    // room says anything.
    let moving = got.find("moving on").expect("goodbye flushed");
    let greets = got.find("the arena greets you").unwrap();
    assert!(moving < greets, "switch deferred until output drained");

    assert_eq!(deinits.load(Ordering::Relaxed), 1);
    assert_eq!(inits.load(Ordering::Relaxed), 1);
    assert_eq!(arena.member_count(), 1);

    // The session now dispatches through the arena only.
    send(&mut client, "hello\r\n").await;
    recv_until(&mut client, "arena: hello").await;

    // Disconnecting tears the session out of its current room.
    drop(client);
    timeout(Duration::from_secs(5), async {
        while arena.member_count() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("arena roster empties on disconnect");
}
