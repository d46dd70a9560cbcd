//! Rules of a single Liar's Dice match.
//!
//! A [`Match`] is a table of [`Seat`]s. Seats act in turn, each either raising the
//! previous [`Bid`] or issuing a [`Challenge`]. A challenge ends the match, which is then
//! settled by [`Match::resolve`].
//!
//! Ones are wild: they count towards every face (see [`Match::face_count`]).
//!
//! Every type here derives `Serialize`/`Deserialize` with the field names of the
//! competitor protocol, so a match can be handed to a competitor as-is.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Face that counts towards every bid.
pub const WILD_FACE: u8 = 1;
/// Lowest face a bid may name.
pub const MIN_BID_FACE: i32 = 2;
/// Highest face a bid may name.
pub const MAX_BID_FACE: i32 = 6;
/// Highest count a bid may claim. Caps the bid ladder, so every match terminates.
pub const MAX_BID_COUNT: i32 = 20;

/// A claim that at least `min_count` dice show `face` (or the wild face).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bid {
    pub face: i32,
    pub min_count: i32,
}

impl Bid {
    pub fn new(face: i32, min_count: i32) -> Bid {
        Bid { face, min_count }
    }

    /// True if `self` may follow `previous`: a higher face with at least the same count,
    /// or the same face with a higher count.
    pub fn dominates(&self, previous: &Bid) -> bool {
        (self.face > previous.face && self.min_count >= previous.min_count)
            || (self.face == previous.face && self.min_count > previous.min_count)
    }

    fn is_in_range(&self) -> bool {
        (MIN_BID_FACE..=MAX_BID_FACE).contains(&self.face)
            && (1..=MAX_BID_COUNT).contains(&self.min_count)
    }
}

/// Disputes the previous bid. Serialized as an empty object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Challenge {}

/// Exactly one of [`Bid`] or [`Challenge`].
///
/// Wire form is `{"bid":{"face":..,"min_count":..}}` or `{"challenge":{}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Bid(Bid),
    Challenge(Challenge),
}

impl Action {
    pub fn bid(face: i32, min_count: i32) -> Action {
        Action::Bid(Bid::new(face, min_count))
    }

    pub fn challenge() -> Action {
        Action::Challenge(Challenge {})
    }

    pub fn as_bid(&self) -> Option<&Bid> {
        match self {
            Action::Bid(bid) => Some(bid),
            Action::Challenge(_) => None,
        }
    }

    pub fn is_challenge(&self) -> bool {
        matches!(self, Action::Challenge(_))
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Bid(bid) => write!(f, "{} {}'s.", bid.face, bid.min_count),
            Action::Challenge(_) => write!(f, "challenge."),
        }
    }
}

/// One player at the table.
///
/// `faces.len()` is the number of dice held; it never changes during a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: String,
    pub faces: Vec<u8>,
    pub actions: Vec<Action>,
}

impl Seat {
    pub fn new(id: impl Into<String>, faces: Vec<u8>) -> Seat {
        Seat {
            id: id.into(),
            faces,
            actions: vec![],
        }
    }
}

/// State of one match.
///
/// Invariant: `seats` is not empty and `current_seat_index < seats.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    #[serde(rename = "players")]
    pub seats: Vec<Seat>,
    #[serde(rename = "player_index")]
    pub current_seat_index: usize,
}

impl Match {
    /// The first seat acts first.
    pub fn new(seats: Vec<Seat>) -> Match {
        Match {
            seats,
            current_seat_index: 0,
        }
    }

    /// Builds a match with freshly rolled dice, sorted ascending for display.
    pub fn roll<R, I, S>(players: I, rng: &mut R) -> Match
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let seats = players
            .into_iter()
            .map(|(id, dice_count)| {
                let mut faces = (0..dice_count)
                    .map(|_| rng.random_range(1..=6u8))
                    .collect::<Vec<_>>();
                faces.sort_unstable();
                Seat::new(id, faces)
            })
            .collect();
        Match::new(seats)
    }

    pub fn current_seat(&self) -> &Seat {
        &self.seats[self.current_seat_index]
    }

    pub fn previous_seat_index(&self) -> usize {
        (self.current_seat_index + self.seats.len() - 1) % self.seats.len()
    }

    /// The previous seat's latest action. Until the match ends, this is the most recent
    /// action of the match.
    pub fn last_action(&self) -> Option<&Action> {
        self.seats[self.previous_seat_index()].actions.last()
    }

    /// The bid currently on the table, or the challenged bid once the match is finished.
    pub fn last_bid(&self) -> Option<&Bid> {
        self.last_action().and_then(Action::as_bid)
    }

    /// Dice showing `target_face` or the wild face, across every seat.
    ///
    /// Masked dice (zeros) never count.
    pub fn face_count(&self, target_face: i32) -> usize {
        self.seats
            .iter()
            .flat_map(|seat| seat.faces.iter())
            .filter(|&&face| face == WILD_FACE || i32::from(face) == target_face)
            .count()
    }

    /// Total number of dice on the table.
    pub fn dice_count(&self) -> usize {
        self.seats.iter().map(|seat| seat.faces.len()).sum()
    }

    pub fn is_legal(&self, action: &Action) -> bool {
        if self.is_finished() {
            return false;
        }
        let last = self.last_action();
        match action {
            Action::Bid(bid) => {
                bid.is_in_range()
                    && last
                        .and_then(Action::as_bid)
                        .map_or(true, |previous| bid.dominates(previous))
            }
            Action::Challenge(_) => last.is_some(),
        }
    }

    /// Records `action` for the acting seat. A bid passes the turn, a challenge ends the match.
    ///
    /// Legality is not checked here, see [`Match::is_legal`].
    pub fn apply(&mut self, action: Action) {
        let index = self.current_seat_index;
        self.seats[index].actions.push(action);
        if !action.is_challenge() {
            self.current_seat_index = (index + 1) % self.seats.len();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.current_seat()
            .actions
            .last()
            .is_some_and(Action::is_challenge)
    }

    /// Dice count change per seat once the match is finished, `None` before that.
    ///
    /// - overclaim: the bidder loses the missing dice
    /// - underclaim: the challenger loses the surplus
    /// - exact: every seat except the bidder loses one die
    pub fn resolve(&self) -> Option<Vec<i32>> {
        if !self.is_finished() {
            return None;
        }
        let bid = self.last_bid()?;
        let actual = self.face_count(bid.face) as i32;
        let bidder = self.previous_seat_index();
        let challenger = self.current_seat_index;

        let mut deltas = vec![0; self.seats.len()];
        if actual < bid.min_count {
            deltas[bidder] = actual - bid.min_count;
        } else if actual > bid.min_count {
            deltas[challenger] = bid.min_count - actual;
        } else {
            for (index, delta) in deltas.iter_mut().enumerate() {
                if index != bidder {
                    *delta = -1;
                }
            }
        }
        Some(deltas)
    }

    /// The match as seen by the acting seat: every other seat's dice are replaced by zeros.
    pub fn masked(&self) -> Match {
        let mut masked = self.clone();
        for (index, seat) in masked.seats.iter_mut().enumerate() {
            if index != self.current_seat_index {
                seat.faces.iter_mut().for_each(|face| *face = 0);
            }
        }
        masked
    }
}
