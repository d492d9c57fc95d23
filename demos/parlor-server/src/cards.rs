//! Cards, the deck, and the table for the fool game.

use std::fmt;

use rand::seq::SliceRandom;

/// Cards dealt back up to after every turn.
pub const HAND_BASE: usize = 6;

/// Most simultaneous attacks on the table.
pub const TABLE_MAX: usize = HAND_BASE;

pub const DECK_SIZE: usize = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suit {
    Spades,
    Clubs,
    Hearts,
    Diamonds,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Clubs, Suit::Hearts, Suit::Diamonds];

    /// ASCII stand-ins, one column wide: `^ % v #`.
    fn glyph(self) -> char {
        match self {
            Suit::Spades => '^',
            Suit::Clubs => '%',
            Suit::Hearts => 'v',
            Suit::Diamonds => '#',
        }
    }
}

/// Ranks run 2..=14; jack through ace take the top four.
pub const RANK_MIN: u8 = 2;
pub const RANK_JACK: u8 = 11;
pub const RANK_QUEEN: u8 = 12;
pub const RANK_KING: u8 = 13;
pub const RANK_ACE: u8 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Card {
    pub suit: Suit,
    pub rank: u8,
}

impl Card {
    /// Whether this card beats `other` in a defense, given the trump suit:
    /// higher in the same suit, or any trump against a non-trump.
    pub fn beats(self, other: Card, trump: Suit) -> bool {
        (self.suit == other.suit && self.rank > other.rank)
            || (self.suit == trump && other.suit != trump)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rank {
            r @ RANK_MIN..RANK_JACK => write!(f, "{r}{}", self.suit.glyph()),
            RANK_JACK => write!(f, "J{}", self.suit.glyph()),
            RANK_QUEEN => write!(f, "Q{}", self.suit.glyph()),
            RANK_KING => write!(f, "K{}", self.suit.glyph()),
            RANK_ACE => write!(f, "A{}", self.suit.glyph()),
            r => write!(f, "?{r}"),
        }
    }
}

/// A shuffled deck. The trump is the bottom card and is drawn last.
pub struct Deck {
    cards: Vec<Card>,
    pub trump: Card,
}

impl Deck {
    /// A deck with a known draw order — `cards` are drawn back to front.
    /// Used for scripted games in tests.
    pub fn stacked(trump: Card, cards: Vec<Card>) -> Self {
        Self { cards, trump }
    }

    pub fn shuffled() -> Self {
        let mut cards: Vec<Card> = Suit::ALL
            .iter()
            .flat_map(|&suit| (RANK_MIN..=RANK_ACE).map(move |rank| Card { suit, rank }))
            .collect();
        debug_assert_eq!(cards.len(), DECK_SIZE);
        cards.shuffle(&mut rand::rng());
        let trump = cards[0];
        Self { cards, trump }
    }

    /// Draws from the top; `None` once the deck has run dry.
    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// One attack card and its answer, if it has been beaten yet.
pub struct Faceoff {
    pub attack: Card,
    pub defense: Option<Card>,
}

/// The cards in play this turn. Defenses fill in attack order, so the
/// beaten faceoffs are always a prefix.
#[derive(Default)]
pub struct Table {
    faceoffs: Vec<Faceoff>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.faceoffs.clear();
    }

    pub fn faceoffs(&self) -> &[Faceoff] {
        &self.faceoffs
    }

    pub fn played(&self) -> usize {
        self.faceoffs.len()
    }

    pub fn beaten(&self) -> usize {
        self.faceoffs.iter().filter(|f| f.defense.is_some()).count()
    }

    /// Every attack answered (an empty table counts as beaten).
    pub fn is_beaten(&self) -> bool {
        self.played() <= self.beaten()
    }

    /// No further attacks allowed: the defender could not answer more
    /// cards than they hold, and never more than [`TABLE_MAX`].
    pub fn is_full(&self, defender_hand: usize) -> bool {
        self.played() >= (defender_hand + self.beaten()).min(TABLE_MAX)
    }

    /// An attack must match the rank of some card already in play; the
    /// opening attack is unconstrained.
    pub fn attacker_can_play(&self, card: Card) -> bool {
        if self.played() == 0 {
            return true;
        }
        if self.played() >= TABLE_MAX {
            return false;
        }
        self.faceoffs.iter().any(|f| {
            f.attack.rank == card.rank || f.defense.is_some_and(|d| d.rank == card.rank)
        })
    }

    /// A defense must beat the first unanswered attack.
    pub fn defender_can_play(&self, card: Card, trump: Suit) -> bool {
        let beaten = self.beaten();
        if self.played() == 0 || beaten >= self.played() {
            return false;
        }
        card.beats(self.faceoffs[beaten].attack, trump)
    }

    pub fn attacker_play(&mut self, card: Card) -> bool {
        if !self.attacker_can_play(card) {
            return false;
        }
        self.faceoffs.push(Faceoff {
            attack: card,
            defense: None,
        });
        true
    }

    pub fn defender_play(&mut self, card: Card, trump: Suit) -> bool {
        if !self.defender_can_play(card, trump) {
            return false;
        }
        let beaten = self.beaten();
        self.faceoffs[beaten].defense = Some(card);
        true
    }

    /// The defender failed: every card in play goes into `hand`.
    pub fn drain_into(&mut self, hand: &mut Vec<Card>) {
        for faceoff in self.faceoffs.drain(..) {
            hand.insert(0, faceoff.attack);
            if let Some(defense) = faceoff.defense {
                hand.insert(0, defense);
            }
        }
    }
}

/// Whether any card in `hand` is currently a legal attack.
pub fn hand_can_attack(table: &Table, hand: &[Card]) -> bool {
    hand.iter().any(|&card| table.attacker_can_play(card))
}

/// Hands are indexed `a..z` then `A..Z` in prompts and commands.
pub fn index_char(i: usize) -> char {
    if i < 26 {
        (b'a' + i as u8) as char
    } else {
        (b'A' + (i - 26) as u8) as char
    }
}

/// Inverse of [`index_char`]; `None` for anything out of range.
pub fn char_index(c: char) -> Option<usize> {
    match c {
        'a'..='z' => Some(c as usize - 'a' as usize),
        'A'..='Z' => Some(c as usize - 'A' as usize + 26),
        _ => None,
    }
}
