//! Plays one match between the contenders of a set.

use rand::Rng;
use tracing::{debug, trace};

use crate::{
    channel::CompetitorChannel,
    game::{Action, Match},
    protocol::CommError,
};

/// Dice lost by a seat whose action is illegal.
pub const ILLEGAL_ACTION_PENALTY: i32 = -91;
/// Dice lost by a seat that could not provide an action.
pub const COMMUNICATION_FAILURE_PENALTY: i32 = -92;

/// A seat at the table: the set alias, the dice held, and the way to reach the competitor.
pub struct Contender<'a, C> {
    pub alias: &'a str,
    pub dice: usize,
    pub channel: &'a mut C,
}

/// How a match ended.
#[derive(Debug)]
pub enum Ending {
    /// A challenge was issued and settled by the rules.
    Resolved,
    /// The seat proposed an action the rules do not allow. The action is not recorded in the match.
    IllegalAction { seat: usize, action: Action },
    /// The seat did not answer in time, or answered garbage.
    CommunicationFailure { seat: usize, error: CommError },
}

impl Ending {
    /// The seat that caused a penalty, if any.
    pub fn offender(&self) -> Option<usize> {
        match self {
            Ending::Resolved => None,
            Ending::IllegalAction { seat, .. } | Ending::CommunicationFailure { seat, .. } => {
                Some(*seat)
            }
        }
    }
}

#[derive(Debug)]
pub struct MatchOutcome {
    /// Final state, unmasked.
    pub game: Match,
    /// Dice count change per seat, in seating order.
    pub deltas: Vec<i32>,
    pub ending: Ending,
}

/// Rolls fresh dice for every contender and plays until a challenge, an illegal action
/// or a communication failure.
///
/// Contenders are seated in the given order; there must be at least two.
pub fn play_match<C, R>(contenders: &mut [Contender<'_, C>], rng: &mut R) -> MatchOutcome
where
    C: CompetitorChannel,
    R: Rng + ?Sized,
{
    let mut game = Match::roll(
        contenders
            .iter()
            .map(|contender| (contender.alias, contender.dice)),
        rng,
    );
    trace!(?game, "dice rolled");

    loop {
        let seat = game.current_seat_index;
        let action = match contenders[seat].channel.request_action(&game.masked()) {
            Ok(action) => action,
            Err(error) => {
                debug!(alias = contenders[seat].alias, %error, "communication failure");
                let ending = Ending::CommunicationFailure { seat, error };
                return penalize(game, ending, COMMUNICATION_FAILURE_PENALTY);
            }
        };

        if !game.is_legal(&action) {
            debug!(alias = contenders[seat].alias, %action, "illegal action");
            return penalize(game, Ending::IllegalAction { seat, action }, ILLEGAL_ACTION_PENALTY);
        }
        game.apply(action);

        if let Some(deltas) = game.resolve() {
            return MatchOutcome {
                game,
                deltas,
                ending: Ending::Resolved,
            };
        }
    }
}

fn penalize(game: Match, ending: Ending, penalty: i32) -> MatchOutcome {
    let mut deltas = vec![0; game.seats.len()];
    if let Some(seat) = ending.offender() {
        deltas[seat] = penalty;
    }
    MatchOutcome {
        game,
        deltas,
        ending,
    }
}
