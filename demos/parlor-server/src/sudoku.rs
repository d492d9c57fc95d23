//! The sudoku room: a cooperative 9×9 puzzle.
//!
//! Everyone in the room works on the same board. The puzzle is generated
//! on the spot — a randomized full grid, then holes dug one by one while
//! a counting solver confirms the solution stays unique. Initial cells
//! are fixed; anything the players place can be taken back with `rm`.

use std::fmt::Write as _;
use std::sync::Arc;

use parlor::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;

pub const MAX_PLAYERS: usize = 8;

pub const BOARD_SIZE: usize = 9;
const BLOCK_SIZE: usize = 3;
const NUM_CELLS: usize = BOARD_SIZE * BOARD_SIZE;

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Default)]
struct Cell {
    /// 1..=9, or 0 for empty.
    val: u8,
    /// Part of the generated puzzle, immutable to players.
    initial: bool,
}

/// A 9×9 board plus the fixed-cell mask.
#[derive(Clone)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    pub fn empty() -> Self {
        Self {
            cells: [[Cell::default(); BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Generates a puzzle with exactly one solution.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let mut board = Self::empty();
        let filled = board.fill_from(0, &mut rng);
        debug_assert!(filled, "an empty grid is always completable");

        board.dig_holes(&mut rng);
        for row in &mut board.cells {
            for cell in row {
                cell.initial = cell.val != 0;
            }
        }
        board
    }

    /// Completes the grid from linear position `pos` with randomized
    /// digit order; backtracks on dead ends.
    fn fill_from(&mut self, pos: usize, rng: &mut impl Rng) -> bool {
        if pos == NUM_CELLS {
            return true;
        }
        let (y, x) = (pos / BOARD_SIZE, pos % BOARD_SIZE);
        if self.cells[y][x].val != 0 {
            return self.fill_from(pos + 1, rng);
        }

        let mut digits: [u8; 9] = [1, 2, 3, 4, 5, 6, 7, 8, 9];
        digits.shuffle(rng);
        for n in digits {
            if self.placement_is_legal(x, y, n) {
                self.cells[y][x].val = n;
                if self.fill_from(pos + 1, rng) {
                    return true;
                }
                self.cells[y][x].val = 0;
            }
        }
        false
    }

    /// Empties cells in random order, keeping each hole only while the
    /// solution stays unique.
    fn dig_holes(&mut self, rng: &mut impl Rng) {
        let mut order: Vec<usize> = (0..NUM_CELLS).collect();
        order.shuffle(rng);
        for pos in order {
            let (y, x) = (pos / BOARD_SIZE, pos % BOARD_SIZE);
            let saved = self.cells[y][x].val;
            self.cells[y][x].val = 0;
            if self.count_solutions(2) != 1 {
                self.cells[y][x].val = saved;
            }
        }
    }

    /// Counts completions of the current position, stopping at `limit`.
    fn count_solutions(&mut self, limit: usize) -> usize {
        let Some(pos) = (0..NUM_CELLS)
            .find(|p| self.cells[p / BOARD_SIZE][p % BOARD_SIZE].val == 0)
        else {
            return 1;
        };
        let (y, x) = (pos / BOARD_SIZE, pos % BOARD_SIZE);

        let mut total = 0;
        for n in 1..=9 {
            if self.placement_is_legal(x, y, n) {
                self.cells[y][x].val = n;
                total += self.count_solutions(limit - total);
                self.cells[y][x].val = 0;
                if total >= limit {
                    break;
                }
            }
        }
        total
    }

    /// Whether `n` at (x, y) conflicts with its row, column, or block.
    pub fn placement_is_legal(&self, x: usize, y: usize, n: u8) -> bool {
        for i in 0..BOARD_SIZE {
            if self.cells[y][i].val == n || self.cells[i][x].val == n {
                return false;
            }
        }
        let (bx, by) = (x - x % BLOCK_SIZE, y - y % BLOCK_SIZE);
        for dy in 0..BLOCK_SIZE {
            for dx in 0..BLOCK_SIZE {
                if self.cells[by + dy][bx + dx].val == n {
                    return false;
                }
            }
        }
        true
    }

    /// Places `n` at (x, y) if the cell is free and the move is legal.
    pub fn try_put(&mut self, x: usize, y: usize, n: u8) -> bool {
        let cell = self.cells[y][x];
        if cell.initial || cell.val != 0 || !self.placement_is_legal(x, y, n) {
            return false;
        }
        self.cells[y][x].val = n;
        true
    }

    /// Clears (x, y) if it holds a player-placed number.
    pub fn try_remove(&mut self, x: usize, y: usize) -> bool {
        let cell = self.cells[y][x];
        if cell.initial || cell.val == 0 {
            return false;
        }
        self.cells[y][x].val = 0;
        true
    }

    /// Full board — legality is enforced on every put, so full means
    /// solved.
    pub fn is_solved(&self) -> bool {
        self.cells
            .iter()
            .all(|row| row.iter().all(|cell| cell.val != 0))
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// Room module for the sudoku puzzle.
pub struct SudokuModule;

#[derive(Clone, Copy, PartialEq, Eq)]
enum GameState {
    AwaitingPlayers,
    InProgress,
    GameEnd,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PlayerState {
    /// Joined mid-game, has not pressed ENTER yet.
    Lobby,
    Playing,
}

struct SudokuRoom {
    state: GameState,
    board: Board,
    hub: RoomRef,
}

struct SudokuSession {
    state: PlayerState,
}

fn puzzle_mut(members: &mut [Member], i: usize) -> &mut SudokuSession {
    members[i]
        .state
        .downcast_mut::<SudokuSession>()
        .expect("sudoku session state")
}

fn puzzle_ref(members: &[Member], i: usize) -> &SudokuSession {
    members[i]
        .state
        .downcast_ref::<SudokuSession>()
        .expect("sudoku session state")
}

impl RoomModule for SudokuModule {
    fn name(&self) -> &'static str {
        "sudoku"
    }

    fn init_room(&self, room: &mut Room, payload: Payload) -> Result<(), RoomError> {
        let payload = payload
            .downcast::<GamePayload>()
            .map_err(|_| RoomError::InvalidPayload("GamePayload"))?;
        room.capacity = MAX_PLAYERS;
        room.state = Box::new(SudokuRoom {
            state: GameState::AwaitingPlayers,
            board: Board::empty(),
            hub: payload.hub,
        });
        Ok(())
    }

    fn init_session(&self, room: &mut Room, handle: &Arc<SessionHandle>) {
        let sudoku = room
            .state
            .downcast_ref::<SudokuRoom>()
            .expect("sudoku room state");
        if room.members.len() >= room.capacity {
            handle.post_outbound(format!(
                "The server is full ({}/{})!\r\n",
                room.capacity, room.capacity
            ));
            handle.request_room_switch(Arc::clone(&sudoku.hub));
            return;
        }

        let verb = if sudoku.state == GameState::AwaitingPlayers {
            "start"
        } else {
            "join"
        };
        handle.post_outbound(format!(
            "{CLEAR_SCREEN}Welcome to the game of SUDOKU! \
             Press ENTER to {verb} the game\r\n\
             Commands:\r\n\
             \x20  <put *col* *row* *n*>: place a number (all 1-9)\r\n\
             \x20  <rm *col* *row*>: clear a cell you filled\r\n\
             \x20  <quit>: quit the game, works at any moment\r\n\
             \x20  <chat>: switch to the in-game chat\r\n\
             \x20  <game>: switch back from the chat\r\n"
        ));
        room.add_member(
            Arc::clone(handle),
            Box::new(SudokuSession {
                state: PlayerState::Lobby,
            }),
        );
    }

    fn deinit_session(&self, room: &mut Room, handle: &Arc<SessionHandle>) {
        let Some(idx) = room.member_index(handle.id()) else {
            return;
        };
        let name = room.name();
        let Room { state, members, .. } = room;
        let sudoku = state.downcast_mut::<SudokuRoom>().expect("sudoku room state");

        members.remove(idx);
        if members.is_empty() {
            sudoku.state = GameState::AwaitingPlayers;
            sudoku.board = Board::empty();
        } else {
            send_updates_to_all(sudoku, members, &name);
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
        let sudoku = state.downcast_mut::<SudokuRoom>().expect("sudoku room state");

        if line == "quit" || sudoku.state == GameState::GameEnd {
            handle.request_room_switch(Arc::clone(&sudoku.hub));
            return;
        }

        let Some(idx) = members.iter().position(|m| m.handle.id() == handle.id()) else {
            return;
        };

        // Any keypress fires up the board for the first arrivals.
        if sudoku.state == GameState::AwaitingPlayers {
            puzzle_mut(members, idx).state = PlayerState::Playing;
            sudoku.state = GameState::InProgress;
            sudoku.board = Board::generate();
            send_updates_to_all(sudoku, members, &name);
            return;
        }

        if puzzle_ref(members, idx).state == PlayerState::Lobby {
            puzzle_mut(members, idx).state = PlayerState::Playing;
            send_updates_to_all(sudoku, members, &name);
            return;
        }

        if members[idx].in_chat {
            if line == "game" {
                members[idx].in_chat = false;
                send_updates_to_player(sudoku, members, &name, idx);
            } else if !line.is_empty() && !chat.try_post_message(members, idx, line) {
                handle.post_outbound("The message is too long!\r\n");
            }
            return;
        } else if line == "chat" {
            members[idx].in_chat = true;
            chat.send_updates(&members[idx], Some("In-game chat\r\n\r\n"));
            return;
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        match *words.as_slice() {
            [] => send_updates_to_player(sudoku, members, &name, idx),
            ["put", col, row, n] => {
                let Some(((x, y), n)) = parse_coords(col, row).zip(parse_digit(n)) else {
                    handle.post_outbound("The command is invalid or can not be used now\r\n > ");
                    return;
                };
                if !sudoku.board.try_put(x, y, n) {
                    handle.post_outbound("Can't place that number there\r\n > ");
                    return;
                }
                if sudoku.board.is_solved() {
                    finish_game(sudoku, members, log, &name);
                } else {
                    send_updates_to_all(sudoku, members, &name);
                }
            }
            ["rm", col, row] => {
                let Some((x, y)) = parse_coords(col, row) else {
                    handle.post_outbound("The command is invalid or can not be used now\r\n > ");
                    return;
                };
                if !sudoku.board.try_remove(x, y) {
                    handle.post_outbound("Can't clear that cell\r\n > ");
                    return;
                }
                send_updates_to_all(sudoku, members, &name);
            }
            _ => {
                handle.post_outbound("The command is invalid or can not be used now\r\n > ");
            }
        }
    }

    fn is_available(&self, room: &Room) -> bool {
        let sudoku = room
            .state
            .downcast_ref::<SudokuRoom>()
            .expect("sudoku room state");
        room.members.len() < room.capacity && sudoku.state != GameState::GameEnd
    }
}

/// 1-based board coordinates as typed by players.
fn parse_coords(col: &str, row: &str) -> Option<(usize, usize)> {
    let x: usize = col.parse().ok()?;
    let y: usize = row.parse().ok()?;
    ((1..=BOARD_SIZE).contains(&x) && (1..=BOARD_SIZE).contains(&y))
        .then(|| (x - 1, y - 1))
}

fn parse_digit(n: &str) -> Option<u8> {
    let n: u8 = n.parse().ok()?;
    (1..=9).contains(&n).then_some(n)
}

fn finish_game(sudoku: &mut SudokuRoom, members: &[Member], log: &ResultsLog, name: &str) {
    sudoku.state = GameState::GameEnd;
    for member in members {
        member.handle.post_outbound(format!(
            "{CLEAR_SCREEN}The board is solved! Congratulations! Press ENTER to exit\r\n"
        ));
    }

    let mut entry = format!("SUDOKU: room {}, players({}):", name, members.len());
    for member in members {
        let _ = write!(entry, " {}(solved)", member.name().unwrap_or_default());
    }
    log.append(&entry);
}

fn send_updates_to_all(sudoku: &SudokuRoom, members: &[Member], name: &str) {
    for i in 0..members.len() {
        send_updates_to_player(sudoku, members, name, i);
    }
}

fn send_updates_to_player(sudoku: &SudokuRoom, members: &[Member], name: &str, i: usize) {
    if members[i].in_chat || puzzle_ref(members, i).state == PlayerState::Lobby {
        return;
    }

    let n = members.len();
    let mut sb = String::from(CLEAR_SCREEN);
    let _ = write!(sb, "Room: {name}\r\n");
    sb.push_str("Other players:");
    let mut j = if i == 0 { n - 1 } else { i - 1 };
    while j != i {
        let _ = write!(sb, " {}", members[j].name().unwrap_or_default());
        j = if j == 0 { n - 1 } else { j - 1 };
    }
    sb.push_str("\r\n\r\n");

    add_line_sep(&mut sb);
    for y in 0..BOARD_SIZE {
        sb.push('+');
        for x in 0..BOARD_SIZE {
            match sudoku.board.cells[y][x].val {
                0 => sb.push_str("   |"),
                v => {
                    let _ = write!(sb, " {v} |");
                }
            }
        }
        sb.push_str("\r\n");
        add_line_sep(&mut sb);
    }
    sb.push_str(" > ");

    members[i].handle.post_outbound(sb);
}

fn add_line_sep(sb: &mut String) {
    sb.push('+');
    for _ in 0..BOARD_SIZE {
        sb.push_str("---+");
    }
    sb.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_board() -> Board {
        let mut board = Board::empty();
        assert!(board.fill_from(0, &mut rand::rng()));
        board
    }

    #[test]
    fn test_placement_legality_covers_row_col_block() {
        let mut board = Board::empty();
        board.cells[4][4].val = 5;

        assert!(!board.placement_is_legal(0, 4, 5), "row conflict");
        assert!(!board.placement_is_legal(4, 0, 5), "column conflict");
        assert!(!board.placement_is_legal(3, 3, 5), "block conflict");
        assert!(board.placement_is_legal(0, 0, 5));
        assert!(board.placement_is_legal(0, 4, 6));
    }

    #[test]
    fn test_filled_grid_is_legal_and_solved() {
        let board = full_board();
        assert!(board.is_solved());
        for y in 0..BOARD_SIZE {
            for x in 0..BOARD_SIZE {
                let v = board.cells[y][x].val;
                assert!((1..=9).contains(&v));
            }
        }
        // Row, column, and block sums all come out to 45 on a legal grid.
        for i in 0..BOARD_SIZE {
            let row: u32 = (0..9).map(|x| board.cells[i][x].val as u32).sum();
            let col: u32 = (0..9).map(|y| board.cells[y][i].val as u32).sum();
            assert_eq!(row, 45);
            assert_eq!(col, 45);
        }
    }

    #[test]
    fn test_generate_produces_a_unique_solution() {
        let mut board = Board::generate();
        assert!(!board.is_solved(), "some holes were dug");
        assert_eq!(board.count_solutions(2), 1);
        for y in 0..BOARD_SIZE {
            for x in 0..BOARD_SIZE {
                let cell = board.cells[y][x];
                assert_eq!(cell.initial, cell.val != 0);
            }
        }
    }

    #[test]
    fn test_try_put_rules() {
        let mut board = Board::generate();
        let (mut x0, mut y0) = (0, 0);
        'find: for y in 0..BOARD_SIZE {
            for x in 0..BOARD_SIZE {
                if board.cells[y][x].val == 0 {
                    (x0, y0) = (x, y);
                    break 'find;
                }
            }
        }
        let legal = (1..=9)
            .find(|&n| board.placement_is_legal(x0, y0, n))
            .expect("a unique-solution hole always has a legal digit");

        assert!(board.try_put(x0, y0, legal));
        assert!(!board.try_put(x0, y0, legal), "cell now occupied");
        assert!(board.try_remove(x0, y0));
        assert!(!board.try_remove(x0, y0), "cell already empty");
    }

    #[test]
    fn test_initial_cells_are_fixed() {
        let mut board = Board::generate();
        let (mut x0, mut y0) = (0, 0);
        'find: for y in 0..BOARD_SIZE {
            for x in 0..BOARD_SIZE {
                if board.cells[y][x].initial {
                    (x0, y0) = (x, y);
                    break 'find;
                }
            }
        }
        assert!(!board.try_remove(x0, y0));
        assert!(!board.try_put(x0, y0, board.cells[y0][x0].val));
    }

    #[test]
    fn test_module_lifecycle() {
        struct StubHub;
        impl RoomModule for StubHub {
            fn name(&self) -> &'static str {
                "hub"
            }
            fn init_room(&self, room: &mut Room, _payload: Payload) -> Result<(), RoomError> {
                room.capacity = usize::MAX;
                Ok(())
            }
            fn init_session(&self, room: &mut Room, handle: &Arc<SessionHandle>) {
                room.add_member(Arc::clone(handle), Box::new(()));
            }
            fn process_line(&self, _room: &mut Room, _handle: &Arc<SessionHandle>, _line: &str) {}
            fn is_available(&self, _room: &Room) -> bool {
                true
            }
        }

        let hub = RoomCell::create("hub", Arc::new(StubHub), Box::new(()), ResultsLog::disabled())
            .expect("stub hub builds");
        let room = RoomCell::create(
            "sudoku0",
            Arc::new(SudokuModule),
            Box::new(GamePayload { hub }),
            ResultsLog::disabled(),
        )
        .expect("sudoku room builds");

        let h1 = SessionHandle::new(SessionId::new(1));
        h1.set_name("ada");
        room.init_session(&h1);
        assert!(matches!(
            h1.next_effect(),
            Some(SessionEffect::Flush(msg))
                if String::from_utf8_lossy(&msg).contains("Welcome to the game of SUDOKU!")
        ));

        // ENTER generates the board and shows it.
        room.process_line(&h1, "");
        assert!(matches!(
            h1.next_effect(),
            Some(SessionEffect::Flush(msg))
                if String::from_utf8_lossy(&msg).contains("Room: sudoku0")
        ));
        assert!(room.is_available(), "others may still join");

        // A bad command re-prompts without touching the board.
        room.process_line(&h1, "put 0 0 1");
        assert!(matches!(
            h1.next_effect(),
            Some(SessionEffect::Flush(msg))
                if String::from_utf8_lossy(&msg).contains("invalid")
        ));

        // `quit` stages the trip home.
        room.process_line(&h1, "quit");
        assert!(matches!(
            h1.next_effect(),
            Some(SessionEffect::Switch(target)) if target.name() == "hub"
        ));
    }
}
