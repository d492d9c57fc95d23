//! The hub: login, global chat, and the room directory.
//!
//! Every session bootstraps here. The hub walks it through the credential
//! file (existing users prove their password, unknown names register on
//! the spot), then drops it into the global chat where the directory
//! commands live: `list`, `create <game>`, `join <room>`. The hub owns
//! the [`RoomRegistry`], so game rooms are created, found, and reclaimed
//! under the hub room's lock.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parlor_protocol::CLEAR_SCREEN;
use parlor_room::{
    Chat, Member, NameDirectory, Payload, Room, RoomError, RoomModule, RoomRef, RoomRegistry,
    SessionHandle, MAX_ROOMS,
};

/// Longest accepted username or password, in bytes.
pub const CREDENTIAL_MAX_LEN: usize = 64;

const GLOBAL_CHAT_GREETING: &str = concat!(
    "Welcome to the global chat!\r\n",
    "Commands:\r\n",
    "   <list>: list all current rooms\r\n",
    "   <create *game name*>: create a new room\r\n",
    "   <join *room name*>: join a room\r\n",
    "   anything else: send a message to the chat\r\n\r\n",
);

/// Payload for [`HubModule::init_room`].
pub struct HubPayload {
    /// The credential file: whitespace-separated `username password`
    /// pairs, read on every lookup, appended on registration.
    pub passwd_path: PathBuf,
    /// The games on offer for `create`, one module per game type.
    pub games: Vec<Arc<dyn RoomModule>>,
    /// Shared directory of logged-in names. Give the server builder the
    /// same instance so claims die with their sessions.
    pub names: NameDirectory,
}

/// Payload the hub hands to every game room it creates.
pub struct GamePayload {
    /// Back-reference for "return to hub" flows: bounced joins, finished
    /// games.
    pub hub: RoomRef,
}

/// The bootstrap room module. See the crate docs for the overall flow.
pub struct HubModule;

struct HubRoom {
    registry: RoomRegistry,
    passwd: PasswdFile,
    games: Vec<Arc<dyn RoomModule>>,
    names: NameDirectory,
}

#[derive(Clone)]
enum LoginState {
    /// Waiting for a username.
    Username,
    /// Known user; waiting for the matching password.
    Password { expected: String },
    /// Unknown user; the next line becomes their password.
    CreateUser,
    /// Logged in, in the global chat.
    GlobalChat,
}

struct HubSession {
    state: LoginState,
}

impl RoomModule for HubModule {
    fn name(&self) -> &'static str {
        "hub"
    }

    fn init_room(&self, room: &mut Room, payload: Payload) -> Result<(), RoomError> {
        let payload = payload
            .downcast::<HubPayload>()
            .map_err(|_| RoomError::InvalidPayload("HubPayload"))?;

        let passwd = PasswdFile::open(&payload.passwd_path)?;

        room.capacity = usize::MAX;
        room.state = Box::new(HubRoom {
            registry: RoomRegistry::new(room.log.clone()),
            passwd,
            games: payload.games,
            names: payload.names,
        });
        Ok(())
    }

    fn init_session(&self, room: &mut Room, handle: &Arc<SessionHandle>) {
        room.add_member(
            Arc::clone(handle),
            Box::new(HubSession {
                state: LoginState::Username,
            }),
        );

        // A session returning from a game is already logged in and goes
        // straight back to the global chat; a fresh connection logs in.
        if handle.name().is_some() {
            let idx = room.members.len() - 1;
            enter_global_chat(&mut room.members, &room.chat, idx);
        } else {
            handle.post_outbound(format!(
                "{CLEAR_SCREEN}Welcome to the parlor! Input your username: "
            ));
        }
    }

    fn process_line(&self, room: &mut Room, handle: &Arc<SessionHandle>, line: &str) {
        let hub_cell = room.cell();
        let Room {
            state,
            members,
            chat,
            ..
        } = room;
        let hub = state.downcast_mut::<HubRoom>().expect("hub room state");
        let Some(idx) = members.iter().position(|m| m.handle.id() == handle.id()) else {
            return;
        };

        match login_state(&mut members[idx]).clone() {
            LoginState::Username => {
                if hub.names.is_claimed(line) {
                    handle.post_outbound(
                        "Such a user is already logged in, try another account\r\n\
                         Input your username: ",
                    );
                    return;
                }
                handle.set_name(line);
                match hub.passwd.lookup(line) {
                    Ok(Some(expected)) => {
                        *login_state(&mut members[idx]) = LoginState::Password { expected };
                        handle.post_outbound("Input your password: ");
                    }
                    Ok(None) => {
                        *login_state(&mut members[idx]) = LoginState::CreateUser;
                        handle.post_outbound("Such a user does not exist, input new password: ");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "credential file lookup failed");
                        handle.post_outbound(
                            "The account book is unreadable right now, try again\r\n\
                             Input your username: ",
                        );
                    }
                }
            }

            LoginState::Password { expected } => {
                let name = handle.name().unwrap_or_default();
                if line != expected {
                    *login_state(&mut members[idx]) = LoginState::Username;
                    handle.post_outbound(
                        "The password is incorrect! Rack your memory and try again\r\n\
                         Input your username: ",
                    );
                } else if !hub.names.claim(&name, handle.id()) {
                    *login_state(&mut members[idx]) = LoginState::Username;
                    handle.post_outbound(
                        "While you were thinking, someone has logged into this account!\r\n\
                         Input your username: ",
                    );
                } else {
                    tracing::info!(session = %handle.id(), user = %name, "logged in");
                    enter_global_chat(members, chat, idx);
                }
            }

            LoginState::CreateUser => {
                let name = handle.name().unwrap_or_default();
                if !credential_is_valid(&name) || !credential_is_valid(line) {
                    *login_state(&mut members[idx]) = LoginState::Username;
                    handle.post_outbound(
                        "The username or password is invalid, try registering again\r\n\
                         Input your username: ",
                    );
                } else if !hub.names.claim(&name, handle.id()) {
                    *login_state(&mut members[idx]) = LoginState::Username;
                    handle.post_outbound(
                        "While you were thinking, someone has logged into this account!\r\n\
                         Input your username: ",
                    );
                } else if let Err(e) = hub.passwd.add_user(&name, line) {
                    tracing::error!(error = %e, user = %name, "credential file append failed");
                    hub.names.release(handle.id());
                    *login_state(&mut members[idx]) = LoginState::Username;
                    handle.post_outbound(
                        "The account book is unwritable right now, try again\r\n\
                         Input your username: ",
                    );
                } else {
                    tracing::info!(session = %handle.id(), user = %name, "account created");
                    enter_global_chat(members, chat, idx);
                }
            }

            LoginState::GlobalChat => {
                if line == "list" {
                    handle.post_outbound(render_rooms_list(&hub.registry));
                } else if line == "create" || line.starts_with("create ") {
                    let game = line.strip_prefix("create ").unwrap_or("");
                    create_and_join_room(hub, hub_cell, handle, game);
                } else if let Some(room_name) = line.strip_prefix("join ") {
                    try_join_existing_room(hub, handle, room_name);
                } else if !line.is_empty() && !chat.try_post_message(members, idx, line) {
                    handle.post_outbound("The message is too long!\r\n");
                }
            }
        }
    }

    fn is_available(&self, _room: &Room) -> bool {
        true
    }
}

fn login_state(member: &mut Member) -> &mut LoginState {
    &mut member
        .state
        .downcast_mut::<HubSession>()
        .expect("hub session state")
        .state
}

fn enter_global_chat(members: &mut [Member], chat: &Chat, idx: usize) {
    members[idx].in_chat = true;
    *login_state(&mut members[idx]) = LoginState::GlobalChat;
    chat.send_updates(&members[idx], Some(GLOBAL_CHAT_GREETING));
}

fn render_rooms_list(registry: &RoomRegistry) -> String {
    let mut out = String::new();
    let _ = write!(out, "\r\nServer rooms (max={MAX_ROOMS}):\r\n");
    for room in registry.rooms() {
        let (cnt, cap) = room.occupancy();
        let closed = if room.is_available() { "" } else { " (closed)" };
        let _ = write!(out, "   {} {}/{}{}\r\n", room.name(), cnt, cap, closed);
    }
    out.push_str("\r\n");
    out
}

fn create_and_join_room(
    hub: &mut HubRoom,
    hub_cell: RoomRef,
    handle: &Arc<SessionHandle>,
    game: &str,
) {
    let module = if game.is_empty() && hub.games.len() == 1 {
        // Bare `create` is unambiguous with a single game on offer.
        Some(Arc::clone(&hub.games[0]))
    } else {
        hub.games.iter().find(|m| m.name() == game).cloned()
    };

    let Some(module) = module else {
        let on_offer: Vec<&str> = hub.games.iter().map(|m| m.name()).collect();
        handle.post_outbound(format!(
            "No such game! Games on offer: {}\r\n",
            on_offer.join(", ")
        ));
        return;
    };

    match hub.registry.create(module, Box::new(GamePayload { hub: hub_cell })) {
        Ok(room) => handle.request_room_switch(room),
        Err(RoomError::RegistryFull(_)) => {
            handle.post_outbound(
                "Max number of rooms is reached, wait for someone to finish playing\r\n",
            );
        }
        Err(e) => {
            tracing::error!(error = %e, game, "room creation failed");
            handle.post_outbound("Couldn't create the room, try again later\r\n");
        }
    }
}

fn try_join_existing_room(hub: &HubRoom, handle: &Arc<SessionHandle>, room_name: &str) {
    match hub.registry.find(room_name) {
        Some(room) if room.is_available() => handle.request_room_switch(room),
        _ => handle.post_outbound("Couldn't access the chosen room! Sumimasen\r\n"),
    }
}

// ---------------------------------------------------------------------------
// Credential file
// ---------------------------------------------------------------------------

/// The on-disk account book: whitespace-separated `username password`
/// pairs. Re-read on every lookup so concurrent appends are always seen.
struct PasswdFile {
    file: File,
}

impl PasswdFile {
    fn open(path: &Path) -> Result<Self, RoomError> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;
        let mut passwd = Self { file };
        if !passwd.is_well_formed()? {
            return Err(RoomError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "malformed credential file",
            )));
        }
        Ok(passwd)
    }

    fn read_words(&mut self) -> io::Result<Vec<String>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        self.file.read_to_string(&mut contents)?;
        Ok(contents.split_whitespace().map(str::to_owned).collect())
    }

    /// Even number of words, none over [`CREDENTIAL_MAX_LEN`].
    fn is_well_formed(&mut self) -> io::Result<bool> {
        let words = self.read_words()?;
        Ok(words.len() % 2 == 0 && words.iter().all(|w| w.len() <= CREDENTIAL_MAX_LEN))
    }

    /// The password recorded for `username`, if any.
    fn lookup(&mut self, username: &str) -> io::Result<Option<String>> {
        let words = self.read_words()?;
        Ok(words
            .chunks_exact(2)
            .find(|pair| pair[0] == username)
            .map(|pair| pair[1].clone()))
    }

    fn add_user(&mut self, username: &str, password: &str) -> io::Result<()> {
        writeln!(self.file, "{username} {password}")?;
        self.file.flush()
    }
}

/// Credentials are non-empty, bounded, visible-ASCII words — anything
/// else would corrupt the whitespace-separated file format.
fn credential_is_valid(cred: &str) -> bool {
    !cred.is_empty()
        && cred.len() <= CREDENTIAL_MAX_LEN
        && cred.bytes().all(|b| (b'!'..=b'~').contains(&b))
}
