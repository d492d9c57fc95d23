//! # Parlor
//!
//! A TCP server hosting many simultaneous text-protocol sessions — a hub
//! plus any number of game rooms — multiplexed without threads, one
//! lightweight task per connection.
//!
//! Clients speak single command lines (`\n` or `\r\n` terminated); the
//! server answers with raw byte blobs. Every session lands in the
//! bootstrap room (normally [`HubModule`]), logs in, and migrates between
//! rooms from there. Game behavior plugs in through
//! [`RoomModule`](parlor_room::RoomModule); the server core never knows
//! what a room actually does.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parlor::prelude::*;
//!
//! # async fn run() -> Result<(), ParlorError> {
//! let names = NameDirectory::new();
//! let payload = HubPayload {
//!     passwd_path: "parlor-passwd".into(),
//!     games: vec![/* Arc<dyn RoomModule> per game */],
//!     names: names.clone(),
//! };
//!
//! let server = ParlorServerBuilder::new()
//!     .bind("0.0.0.0:4000")
//!     .names(names)
//!     .build(Arc::new(HubModule), Box::new(payload))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod hub;
mod server;

pub use error::ParlorError;
pub use hub::{GamePayload, HubModule, HubPayload, CREDENTIAL_MAX_LEN};
pub use server::{ParlorServer, ParlorServerBuilder};

/// The common imports for building and running a server with game modules.
pub mod prelude {
    pub use parlor_protocol::{CLEAR_SCREEN, MAX_LINE_BYTES};
    pub use parlor_room::{
        Chat, Member, NameDirectory, Payload, ResultsLog, Room, RoomCell, RoomError, RoomModule,
        RoomRef, SessionEffect, SessionHandle, SessionId, MAX_CHAT_MSG_LEN,
    };

    pub use crate::{
        GamePayload, HubModule, HubPayload, ParlorError, ParlorServer, ParlorServerBuilder,
    };
}
