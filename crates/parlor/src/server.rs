//! `ParlorServer` builder and accept loop.
//!
//! The server owns the listening socket and the bootstrap room. Each
//! accepted connection becomes a session attached to the bootstrap room
//! and gets its own driver task; everything after that happens between
//! the driver ([`crate::handler`]) and the room modules.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parlor_room::{NameDirectory, Payload, ResultsLog, RoomCell, RoomModule, RoomRef, SessionHandle, SessionId};
use tokio::net::TcpListener;

use crate::handler::drive;
use crate::ParlorError;

/// Counter for generating unique session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Shared server state passed to each connection driver task.
pub(crate) struct ServerState {
    /// Display names of logged-in sessions; claims are released here when
    /// a session dies, whichever room it died in.
    pub(crate) names: NameDirectory,
}

/// Builder for configuring and starting a parlor server.
pub struct ParlorServerBuilder {
    bind_addr: String,
    names: NameDirectory,
    log: ResultsLog,
}

impl ParlorServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:4000".to_string(),
            names: NameDirectory::new(),
            log: ResultsLog::disabled(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Shares a name directory with the bootstrap module.
    ///
    /// Pass the same instance inside the hub's payload so that logins the
    /// hub registers are released when the server reaps the session.
    pub fn names(mut self, names: NameDirectory) -> Self {
        self.names = names;
        self
    }

    /// Sets the results log handed to every room.
    pub fn results_log(mut self, log: ResultsLog) -> Self {
        self.log = log;
        self
    }

    /// Binds the listener and builds the bootstrap room.
    ///
    /// # Errors
    /// Fails when the address cannot be bound or the bootstrap module
    /// rejects its payload — both fatal to startup by design.
    pub async fn build(
        self,
        bootstrap: Arc<dyn RoomModule>,
        payload: Payload,
    ) -> Result<ParlorServer, ParlorError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;

        let name = bootstrap.name();
        let bootstrap = RoomCell::create(name, bootstrap, payload, self.log.clone())?;

        tracing::info!(addr = %self.bind_addr, bootstrap = name, "parlor server listening");

        Ok(ParlorServer {
            listener,
            bootstrap,
            state: Arc::new(ServerState { names: self.names }),
        })
    }
}

impl Default for ParlorServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running parlor server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ParlorServer {
    listener: TcpListener,
    bootstrap: RoomRef,
    state: Arc<ServerState>,
}

impl ParlorServer {
    /// Creates a new builder.
    pub fn builder() -> ParlorServerBuilder {
        ParlorServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each connection is attached to the bootstrap room — whose module
    /// typically stages the login prompt right away — and handed to its
    /// own driver task.
    pub async fn run(self) -> Result<(), ParlorError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let id = SessionId::new(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
                    tracing::info!(session = %id, %addr, "connection accepted");

                    let handle = SessionHandle::new(id);
                    self.bootstrap.init_session(&handle);

                    tokio::spawn(drive(
                        stream,
                        handle,
                        Arc::clone(&self.bootstrap),
                        Arc::clone(&self.state),
                    ));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
