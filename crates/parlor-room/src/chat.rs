//! The per-room chat broadcaster and its bounded history.
//!
//! Every room owns one [`Chat`]. Members opt in and out of "chat mode"
//! (the hub's global chat is permanent, games toggle it with
//! `chat`/`game`); only opted-in members receive broadcasts.

use std::collections::VecDeque;
use std::fmt::Write as _;

use parlor_protocol::CLEAR_SCREEN;

use crate::Member;

/// How many messages a room remembers. Older ones are evicted FIFO.
pub const CHAT_HISTORY_LEN: usize = 16;

/// Longest accepted message, in bytes. Longer posts are rejected whole.
pub const MAX_CHAT_MSG_LEN: usize = 64;

struct ChatMessage {
    author: String,
    text: String,
}

/// Bounded chat history plus broadcast delivery for one room.
pub struct Chat {
    history: VecDeque<ChatMessage>,
}

impl Chat {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(CHAT_HISTORY_LEN),
        }
    }

    /// Posts a message from `members[author]` and broadcasts it.
    ///
    /// Returns `false` (no mutation, no delivery) when `text` exceeds
    /// [`MAX_CHAT_MSG_LEN`]; the caller tells the author. Otherwise the
    /// message enters the history — evicting the oldest entry once
    /// [`CHAT_HISTORY_LEN`] is reached — and every *other* member in chat
    /// mode gets a one-line `author: text` notification as its staged
    /// outbound message.
    pub fn try_post_message(&mut self, members: &[Member], author: usize, text: &str) -> bool {
        debug_assert!(members[author].in_chat, "author must be in chat mode");

        if text.len() > MAX_CHAT_MSG_LEN {
            return false;
        }

        let author_name = members[author].name().unwrap_or_default();
        if self.history.len() == CHAT_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(ChatMessage {
            author: author_name.clone(),
            text: text.to_owned(),
        });

        for (i, member) in members.iter().enumerate() {
            if member.in_chat && i != author {
                member
                    .handle
                    .post_outbound(format!("{author_name}: {text}\r\n"));
            }
        }

        true
    }

    /// Renders the full-screen chat view for `viewer`: screen clear, an
    /// optional header, then every stored message oldest to newest. The
    /// viewer's own messages show as `You: ...`.
    pub fn render_history(&self, viewer: &str, header: Option<&str>) -> String {
        let mut screen = String::from(CLEAR_SCREEN);
        if let Some(header) = header {
            screen.push_str(header);
        }
        for msg in &self.history {
            if msg.author == viewer {
                let _ = writeln!(screen, "You: {}\r", msg.text);
            } else {
                let _ = writeln!(screen, "{}: {}\r", msg.author, msg.text);
            }
        }
        screen
    }

    /// Renders the history for `member` and stages it as their outbound
    /// message — the standard "entered chat" redraw.
    pub fn send_updates(&self, member: &Member, header: Option<&str>) {
        debug_assert!(member.in_chat, "redraw target must be in chat mode");
        let viewer = member.name().unwrap_or_default();
        member
            .handle
            .post_outbound(self.render_history(&viewer, header));
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// `true` when no messages are stored.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}
