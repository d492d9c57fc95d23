//! The fool game room: a trick-taking attack/defense card game.
//!
//! One attacker opens a turn; once the first card lands, every non-defending
//! player may throw in cards whose rank is already on the table. The
//! defender either beats every attack (the table is cleared) or gives up
//! and takes it all. Hands refill to six after each turn while the deck
//! lasts; players who empty their hand drop out to spectate, and the last
//! player still holding cards is the fool.

use std::fmt::Write as _;
use std::sync::Arc;

use parlor::prelude::*;

use crate::cards::{self, Card, Deck, Table, HAND_BASE};

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = cards::DECK_SIZE / HAND_BASE;

/// Screen column the trump indicator is padded out to.
const TRUMP_COLUMN: usize = 70;

/// Room module for the fool game.
pub struct FoolModule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameState {
    AwaitingPlayers,
    /// Waiting for the chosen attacker's opening card.
    FirstCard,
    /// Opening card played; all attackers may throw in.
    FreeForAll,
    GameEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayerState {
    Waiting,
    Attacking,
    Defending,
    Spectating,
}

struct FoolRoom {
    state: GameState,
    active_players: usize,
    defender: usize,
    attacker: usize,
    /// Attackers who can still act this turn; the turn may end once it
    /// reaches zero with the table beaten.
    attackers_left: usize,
    deck: Deck,
    table: Table,
    hub: RoomRef,
}

impl FoolRoom {
    fn new(hub: RoomRef) -> Self {
        Self {
            state: GameState::AwaitingPlayers,
            active_players: 0,
            defender: 0,
            attacker: 0,
            attackers_left: 0,
            deck: Deck::shuffled(),
            table: Table::new(),
            hub,
        }
    }

    fn reset(&mut self) {
        self.state = GameState::AwaitingPlayers;
        self.active_players = 0;
        self.defender = 0;
        self.attacker = 0;
        self.attackers_left = 0;
    }

    fn in_progress(&self) -> bool {
        matches!(self.state, GameState::FirstCard | GameState::FreeForAll)
    }
}

struct FoolSession {
    state: PlayerState,
    hand: Vec<Card>,
    can_attack: bool,
}

impl FoolSession {
    fn new() -> Self {
        Self {
            state: PlayerState::Waiting,
            hand: Vec::new(),
            can_attack: false,
        }
    }
}

fn player(members: &mut [Member], i: usize) -> &mut FoolSession {
    members[i]
        .state
        .downcast_mut::<FoolSession>()
        .expect("fool session state")
}

fn player_ref(members: &[Member], i: usize) -> &FoolSession {
    members[i]
        .state
        .downcast_ref::<FoolSession>()
        .expect("fool session state")
}

fn prev_cycl(i: usize, len: usize) -> usize {
    if i == 0 { len - 1 } else { i - 1 }
}

impl RoomModule for FoolModule {
    fn name(&self) -> &'static str {
        "fool"
    }

    fn init_room(&self, room: &mut Room, payload: Payload) -> Result<(), RoomError> {
        let payload = payload
            .downcast::<GamePayload>()
            .map_err(|_| RoomError::InvalidPayload("GamePayload"))?;
        room.capacity = MAX_PLAYERS;
        room.state = Box::new(FoolRoom::new(payload.hub));
        Ok(())
    }

    fn init_session(&self, room: &mut Room, handle: &Arc<SessionHandle>) {
        let fool = room.state.downcast_ref::<FoolRoom>().expect("fool room state");
        if room.members.len() >= room.capacity {
            handle.post_outbound(format!(
                "The server is full ({}/{})!\r\n",
                room.capacity, room.capacity
            ));
            handle.request_room_switch(Arc::clone(&fool.hub));
            return;
        }
        if fool.state != GameState::AwaitingPlayers {
            handle.post_outbound("The game has already started! Try again later\r\n");
            handle.request_room_switch(Arc::clone(&fool.hub));
            return;
        }

        handle.post_outbound(format!(
            "{CLEAR_SCREEN}Welcome to the game of FOOL! \
             Once there is one more player, you can press ENTER to start the game"
        ));
        room.add_member(Arc::clone(handle), Box::new(FoolSession::new()));

        if room.members.len() == room.capacity {
            let name = room.name();
            let Room { state, members, .. } = room;
            let fool = state.downcast_mut::<FoolRoom>().expect("fool room state");
            start_game(fool, members, &name);
        }
    }

    fn deinit_session(&self, room: &mut Room, handle: &Arc<SessionHandle>) {
        // Bounced sessions were never admitted; nothing to undo.
        let Some(idx) = room.member_index(handle.id()) else {
            return;
        };

        let Room { state, members, .. } = room;
        let fool = state.downcast_mut::<FoolRoom>().expect("fool room state");

        if fool.defender > idx {
            fool.defender -= 1;
        }
        if fool.attacker > idx {
            fool.attacker -= 1;
        }
        let departed = members.remove(idx);
        let was_active = departed
            .state
            .downcast_ref::<FoolSession>()
            .is_some_and(|s| s.state != PlayerState::Spectating);

        // A live player leaving mid-game strands the turn order; the game
        // cannot continue, whatever the reason for the departure.
        if fool.in_progress() && was_active {
            end_game_with_message(
                fool,
                members,
                Some(
                    "\r\nA player has disconnected, thus the game can not continue. \
                     Press ENTER to exit\r\n",
                ),
            );
        }

        if members.is_empty() {
            fool.reset();
        }
    }

    fn process_line(&self, room: &mut Room, handle: &Arc<SessionHandle>, line: &str) {
        let name = room.name();
        let Room {
            state,
            members,
            chat,
            log,
            ..
        } = room;
        let fool = state.downcast_mut::<FoolRoom>().expect("fool room state");

        match fool.state {
            GameState::AwaitingPlayers => {
                if members.len() >= MIN_PLAYERS && line.is_empty() {
                    start_game(fool, members, &name);
                }
                return;
            }
            GameState::GameEnd => {
                handle.request_room_switch(Arc::clone(&fool.hub));
                return;
            }
            _ => {}
        }

        let Some(idx) = members.iter().position(|m| m.handle.id() == handle.id()) else {
            return;
        };

        if members[idx].in_chat {
            if line == "game" {
                members[idx].in_chat = false;
                send_updates_to_player(fool, members, &name, idx);
            } else if !line.is_empty() && !chat.try_post_message(members, idx, line) {
                handle.post_outbound("The message is too long!\r\n");
            }
            return;
        } else if line == "chat" {
            members[idx].in_chat = true;
            chat.send_updates(&members[idx], Some("In-game chat\r\n\r\n"));
            return;
        }

        match (fool.state, player_ref(members, idx).state) {
            (GameState::FirstCard, PlayerState::Defending) => {
                // No action is open to the defender before the first card.
                respond_to_invalid_command(fool, members, idx);
            }
            (GameState::FirstCard, PlayerState::Attacking) => {
                attacker_first_card(fool, members, &name, idx, line);
            }
            (GameState::FreeForAll, PlayerState::Attacking) => {
                attacker_free_for_all(fool, members, log, &name, idx, line);
            }
            (GameState::FreeForAll, PlayerState::Defending) => {
                defender_free_for_all(fool, members, log, &name, idx, line);
            }
            _ => {}
        }
    }

    fn is_available(&self, room: &Room) -> bool {
        let fool = room.state.downcast_ref::<FoolRoom>().expect("fool room state");
        room.members.len() < room.capacity && fool.state == GameState::AwaitingPlayers
    }
}

// ---------------------------------------------------------------------------
// Game flow
// ---------------------------------------------------------------------------

fn start_game(fool: &mut FoolRoom, members: &mut [Member], name: &str) {
    debug_assert!(fool.state == GameState::AwaitingPlayers);
    debug_assert!(members.len() >= MIN_PLAYERS);

    fool.deck = Deck::shuffled();
    fool.table.clear();
    fool.state = GameState::FirstCard;
    fool.active_players = members.len();

    replenish_hands(fool, members);
    choose_first_turn(fool, members);

    send_updates_to_all(fool, members, name);
}

fn replenish_hands(fool: &mut FoolRoom, members: &mut [Member]) {
    debug_assert!(fool.in_progress());
    'deal: for i in 0..members.len() {
        let p = player(members, i);
        if p.state == PlayerState::Spectating {
            continue;
        }
        while p.hand.len() < HAND_BASE {
            match fool.deck.draw() {
                Some(card) => p.hand.insert(0, card),
                None => break 'deal,
            }
        }
    }
}

/// The player holding the lowest trump opens the first turn; the defender
/// sits one seat before them.
fn choose_first_turn(fool: &mut FoolRoom, members: &mut [Member]) {
    debug_assert!(fool.state == GameState::FirstCard);

    let mut min_rank = u8::MAX;
    for i in 0..members.len() {
        for card in &player_ref(members, i).hand {
            if card.suit == fool.deck.trump.suit && card.rank < min_rank {
                fool.attacker = i;
                min_rank = card.rank;
            }
        }
    }

    fool.defender = prev_cycl(fool.attacker, members.len());
    player(members, fool.defender).state = PlayerState::Defending;
    player(members, fool.attacker).state = PlayerState::Attacking;
    fool.attackers_left = 1;
}

fn end_game_with_message(fool: &mut FoolRoom, members: &[Member], msg: Option<&str>) {
    fool.state = GameState::GameEnd;
    if let Some(msg) = msg {
        for member in members {
            member.handle.post_outbound(format!("{CLEAR_SCREEN}{msg}"));
        }
    }
}

/// Ends the turn: the table goes to the defender or away, hands refill,
/// emptied hands drop to spectating, and either the game ends or the turn
/// passes on (skipping the loser an extra seat).
fn switch_turn(
    fool: &mut FoolRoom,
    members: &mut [Member],
    log: &ResultsLog,
    name: &str,
    defender_lost: bool,
) {
    if defender_lost {
        let hand = &mut player(members, fool.defender).hand;
        fool.table.drain_into(hand);
    } else {
        fool.table.clear();
    }

    replenish_hands(fool, members);

    for i in 0..members.len() {
        let p = player(members, i);
        if p.state != PlayerState::Spectating && p.hand.is_empty() {
            p.state = PlayerState::Spectating;
            fool.active_players -= 1;
        }
    }

    if fool.active_players == 1 {
        send_win_lose_messages(members);
        log_game_results(fool, members, log, name);
        end_game_with_message(fool, members, None);
    } else if fool.active_players == 0 {
        send_draw_messages(members);
        log_game_results(fool, members, log, name);
        end_game_with_message(fool, members, None);
    } else {
        fool.state = GameState::FirstCard;
        advance_turns(fool, members, if defender_lost { 2 } else { 1 });
    }
}

fn advance_turns(fool: &mut FoolRoom, members: &mut [Member], mut num_turns: usize) {
    debug_assert!(num_turns > 0 && fool.active_players > 1);
    let len = members.len();

    while num_turns > 0 {
        fool.attacker = prev_cycl(fool.attacker, len);
        if player_ref(members, fool.attacker).state != PlayerState::Spectating {
            num_turns -= 1;
        }
    }

    fool.defender = prev_cycl(fool.attacker, len);
    while player_ref(members, fool.defender).state == PlayerState::Spectating {
        fool.defender = prev_cycl(fool.defender, len);
    }

    for i in 0..len {
        let p = player(members, i);
        if i == fool.attacker {
            p.state = PlayerState::Attacking;
        } else if i == fool.defender {
            p.state = PlayerState::Defending;
        } else if p.state != PlayerState::Spectating {
            p.state = PlayerState::Waiting;
        }
    }

    fool.attackers_left = 1;
}

/// Opens the table to every non-defender, recounting who can still act.
fn enable_free_for_all(fool: &mut FoolRoom, members: &mut [Member]) {
    fool.state = GameState::FreeForAll;
    fool.attackers_left = 0;

    for i in 0..members.len() {
        if player_ref(members, i).state == PlayerState::Waiting {
            player(members, i).state = PlayerState::Attacking;
        }
        if player_ref(members, i).state == PlayerState::Attacking {
            let can = cards::hand_can_attack(&fool.table, &player_ref(members, i).hand);
            player(members, i).can_attack = can;
            if can {
                fool.attackers_left += 1;
            }
        }
    }
}

/// Resolves a one-letter hand index; `None` is an invalid command.
fn retrieve_card(p: &FoolSession, line: &str) -> Option<usize> {
    let mut chars = line.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let idx = cards::char_index(c)?;
    (idx < p.hand.len()).then_some(idx)
}

fn attacker_first_card(
    fool: &mut FoolRoom,
    members: &mut [Member],
    name: &str,
    idx: usize,
    line: &str,
) {
    debug_assert!(fool.state == GameState::FirstCard);

    // The chosen attacker cannot forfeit the opening card.
    if line.is_empty() {
        respond_to_invalid_command(fool, members, idx);
        return;
    }
    let Some(pos) = retrieve_card(player_ref(members, idx), line) else {
        respond_to_invalid_command(fool, members, idx);
        return;
    };
    let card = player_ref(members, idx).hand[pos];
    if fool.table.attacker_play(card) {
        player(members, idx).hand.remove(pos);
        enable_free_for_all(fool, members);
        send_updates_to_all(fool, members, name);
    } else {
        respond_to_invalid_command(fool, members, idx);
    }
}

fn attacker_free_for_all(
    fool: &mut FoolRoom,
    members: &mut [Member],
    log: &ResultsLog,
    name: &str,
    idx: usize,
    line: &str,
) {
    debug_assert!(fool.state == GameState::FreeForAll);

    if line.is_empty() {
        // Forfeit the rest of this turn.
        if player_ref(members, idx).can_attack {
            fool.attackers_left -= 1;
        }
        player(members, idx).state = PlayerState::Waiting;
        if fool.attackers_left == 0 && fool.table.is_beaten() {
            switch_turn(fool, members, log, name, false);
        }
        if fool.state != GameState::GameEnd {
            send_updates_to_all(fool, members, name);
        }
        return;
    }

    let defender_hand = player_ref(members, fool.defender).hand.len();
    if fool.table.is_full(defender_hand) {
        respond_to_invalid_command(fool, members, idx);
        return;
    }
    let Some(pos) = retrieve_card(player_ref(members, idx), line) else {
        respond_to_invalid_command(fool, members, idx);
        return;
    };
    let card = player_ref(members, idx).hand[pos];
    if fool.table.attacker_play(card) {
        player(members, idx).hand.remove(pos);
        if !cards::hand_can_attack(&fool.table, &player_ref(members, idx).hand) {
            player(members, idx).can_attack = false;
            fool.attackers_left -= 1;
        }
        send_updates_to_all(fool, members, name);
    } else {
        respond_to_invalid_command(fool, members, idx);
    }
}

fn defender_free_for_all(
    fool: &mut FoolRoom,
    members: &mut [Member],
    log: &ResultsLog,
    name: &str,
    idx: usize,
    line: &str,
) {
    debug_assert!(fool.state == GameState::FreeForAll && idx == fool.defender);

    if line.is_empty() {
        // Giving up only once no attacker owes a decision: otherwise the
        // table might still grow.
        let defender_hand = player_ref(members, idx).hand.len();
        if fool.attackers_left > 0 && !fool.table.is_full(defender_hand) {
            respond_to_invalid_command(fool, members, idx);
        } else {
            switch_turn(fool, members, log, name, true);
            if fool.state != GameState::GameEnd {
                send_updates_to_all(fool, members, name);
            }
        }
        return;
    }

    if fool.table.is_beaten() {
        // Nothing left to defend against.
        respond_to_invalid_command(fool, members, idx);
        return;
    }
    let Some(pos) = retrieve_card(player_ref(members, idx), line) else {
        respond_to_invalid_command(fool, members, idx);
        return;
    };
    let card = player_ref(members, idx).hand[pos];
    if fool.table.defender_play(card, fool.deck.trump.suit) {
        player(members, idx).hand.remove(pos);

        let defender_hand = player_ref(members, idx).hand.len();
        if fool.table.is_full(defender_hand) && fool.table.is_beaten() {
            switch_turn(fool, members, log, name, false);
        } else {
            // Each defense reopens the throw-in window.
            enable_free_for_all(fool, members);
            if fool.attackers_left == 0 && fool.table.is_beaten() {
                switch_turn(fool, members, log, name, false);
            }
        }
        if fool.state != GameState::GameEnd {
            send_updates_to_all(fool, members, name);
        }
    } else {
        respond_to_invalid_command(fool, members, idx);
    }
}

// ---------------------------------------------------------------------------
// Messages and screens
// ---------------------------------------------------------------------------

fn send_win_lose_messages(members: &[Member]) {
    for (i, member) in members.iter().enumerate() {
        if player_ref(members, i).state == PlayerState::Spectating {
            member.handle.post_outbound(format!(
                "{CLEAR_SCREEN}You've won! Kinda. Press ENTER to exit\r\n"
            ));
        } else {
            member.handle.post_outbound(format!(
                "{CLEAR_SCREEN}You're the fool! Oopsy-daisy) Press ENTER to exit\r\n"
            ));
        }
    }
}

fn send_draw_messages(members: &[Member]) {
    for member in members {
        member.handle.post_outbound(format!(
            "{CLEAR_SCREEN}Seems that nobody is the fool today! What a pity. Press ENTER to exit\r\n"
        ));
    }
}

fn log_game_results(fool: &FoolRoom, members: &[Member], log: &ResultsLog, name: &str) {
    let mut entry = format!("FOOL: room {}, players({}):", name, members.len());
    for (i, member) in members.iter().enumerate() {
        let status = if fool.active_players == 0 {
            "draw"
        } else if player_ref(members, i).state == PlayerState::Spectating {
            "won"
        } else {
            "lost"
        };
        let _ = write!(entry, " {}({})", member.name().unwrap_or_default(), status);
    }
    log.append(&entry);
}

fn respond_to_invalid_command(fool: &FoolRoom, members: &[Member], idx: usize) {
    let mut out = String::from("The command is invalid or can not be used now\r\n");
    match player_ref(members, idx).state {
        PlayerState::Attacking => add_attacker_prompt(&mut out, fool, members, idx),
        PlayerState::Defending => add_defender_prompt(&mut out, fool, members, idx),
        _ => {}
    }
    members[idx].handle.post_outbound(out);
}

/// Letters of the cards this attacker could legally play, then ` > `.
fn add_attacker_prompt(out: &mut String, fool: &FoolRoom, members: &[Member], idx: usize) {
    let defender_hand = player_ref(members, fool.defender).hand.len();
    if !fool.table.is_full(defender_hand) {
        for (i, &card) in player_ref(members, idx).hand.iter().enumerate() {
            if fool.table.attacker_can_play(card) {
                out.push(cards::index_char(i));
            }
        }
    }
    out.push_str(" > ");
}

fn add_defender_prompt(out: &mut String, fool: &FoolRoom, members: &[Member], idx: usize) {
    if !fool.table.is_beaten() {
        for (i, &card) in player_ref(members, idx).hand.iter().enumerate() {
            if fool.table.defender_can_play(card, fool.deck.trump.suit) {
                out.push(cards::index_char(i));
            }
        }
    }
    out.push_str(" => ");
}

fn send_updates_to_all(fool: &FoolRoom, members: &[Member], name: &str) {
    for i in 0..members.len() {
        send_updates_to_player(fool, members, name, i);
    }
}

/// Full-screen redraw: roster, card counts, trump and deck, the table,
/// this player's hand, and their prompt.
fn send_updates_to_player(fool: &FoolRoom, members: &[Member], name: &str, i: usize) {
    if members[i].in_chat {
        return;
    }

    let p = player_ref(members, i);
    let n = members.len();
    let mut sb = String::from(CLEAR_SCREEN);

    let _ = write!(sb, "Room: {name}\r\n");
    sb.push_str("Players:");
    let mut j = prev_cycl(i, n);
    while j != i {
        let _ = write!(sb, " {}", members[j].name().unwrap_or_default());
        j = prev_cycl(j, n);
    }
    sb.push_str("\r\n\r\n");

    // Everyone else's card counts; the defender's count is boxed.
    let mut used = 0;
    let mut j = prev_cycl(i, n);
    while j != i {
        let count = player_ref(members, j).hand.len();
        let piece = if j == fool.defender {
            format!("| {count} |   ")
        } else {
            format!("< {count} >   ")
        };
        used += piece.len();
        sb.push_str(&piece);
        j = prev_cycl(j, n);
    }

    let pad = TRUMP_COLUMN.saturating_sub(used).max(1);
    let _ = write!(sb, "{:pad$}", "");
    let _ = write!(sb, "{}  [ {} ]\r\n", fool.deck.trump, fool.deck.len());

    if fool.table.played() > 0 {
        for faceoff in fool.table.faceoffs() {
            let _ = write!(sb, "\r\n   {}", faceoff.attack);
            if let Some(defense) = faceoff.defense {
                let _ = write!(sb, " / {defense}");
            }
        }
        sb.push_str("\r\n\r\n");
    }

    for (k, card) in p.hand.iter().enumerate() {
        let _ = write!(sb, "{}: {}   ", cards::index_char(k), card);
    }
    sb.push_str("\r\n");

    match p.state {
        PlayerState::Attacking => add_attacker_prompt(&mut sb, fool, members, i),
        PlayerState::Defending => add_defender_prompt(&mut sb, fool, members, i),
        _ => {}
    }

    members[i].handle.post_outbound(sb);
}
