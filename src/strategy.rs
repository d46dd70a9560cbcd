//! Competitor side of the protocol.
//!
//! A competitor is any executable speaking the line protocol of [`crate::protocol`] on its
//! stdin/stdout. This module makes writing one in Rust a matter of implementing
//! [`Strategy`] and calling [`run_stdio`]:
//!
//! ```no_run
//! use liars_dice::{game::{Action, Match}, strategy::{run_stdio, Strategy}};
//!
//! struct Bold;
//!
//! impl Strategy for Bold {
//!     fn action(&mut self, game: &Match) -> Action {
//!         match game.last_bid() {
//!             Some(_) => Action::challenge(),
//!             None => Action::bid(6, 1),
//!         }
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_stdio(Bold)
//! }
//! ```
//!
//! Anything written on stderr is collected by the referee and shown to the operator.

use std::io::{BufRead, Write};

use anyhow::{bail, Context};

use crate::{
    game::{Action, Bid, Match, MAX_BID_COUNT, MAX_BID_FACE, MIN_BID_FACE},
    history::Career,
    protocol::{decode_action, encode_parameter, Command, ACKNOWLEDGEMENT},
};

/// What a competitor implements. Only [`Strategy::action`] is mandatory.
pub trait Strategy {
    /// Called once per set with the careers of every participant, itself included.
    fn check_other_programs(&mut self, _careers: &[Career]) {}

    /// Chooses the next action. Opponents' dice are zeros in `game`.
    fn action(&mut self, game: &Match) -> Action;

    /// Called with the unmasked final state of every match the competitor took part in.
    fn game_end(&mut self, _game: &Match) {}

    fn terminate(&mut self) {}
}

/// Answers requests read from `input` until `terminate` or end of input.
pub fn serve<S, R, W>(strategy: &mut S, mut input: R, mut output: W) -> anyhow::Result<()>
where
    S: Strategy + ?Sized,
    R: BufRead,
    W: Write,
{
    loop {
        let mut command = String::new();
        if input.read_line(&mut command).context("could not read command")? == 0 {
            return Ok(());
        }
        let mut parameter = String::new();
        input
            .read_line(&mut parameter)
            .context("could not read parameter")?;

        let response = match Command::parse(&command) {
            Some(Command::CheckOtherPrograms) => {
                let careers: Vec<Career> =
                    serde_json::from_str(&parameter).context("invalid careers")?;
                strategy.check_other_programs(&careers);
                ACKNOWLEDGEMENT.to_string()
            }
            Some(Command::Action) => {
                let game: Match = serde_json::from_str(&parameter).context("invalid match")?;
                encode_parameter(&strategy.action(&game))?
            }
            Some(Command::GameEnd) => {
                let game: Match = serde_json::from_str(&parameter).context("invalid match")?;
                strategy.game_end(&game);
                ACKNOWLEDGEMENT.to_string()
            }
            Some(Command::Terminate) => {
                strategy.terminate();
                return Ok(());
            }
            None => bail!("unknown command '{}'", command.trim_end()),
        };
        writeln!(output, "{response}").context("could not answer")?;
        output.flush().context("could not answer")?;
    }
}

/// [`serve`] on the process' stdin and stdout.
pub fn run_stdio<S: Strategy>(mut strategy: S) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve(&mut strategy, stdin.lock(), stdout.lock())
}

/// The smallest bid that may follow `last`, if the bid ladder is not exhausted.
pub fn next_minimum_bid(last: Option<&Bid>) -> Option<Bid> {
    let bid = match last {
        None => Bid::new(MIN_BID_FACE, 1),
        Some(last) if last.face < MAX_BID_FACE => Bid::new(last.face + 1, last.min_count.max(1)),
        Some(last) => Bid::new(MAX_BID_FACE, last.min_count + 1),
    };
    (bid.min_count <= MAX_BID_COUNT).then_some(bid)
}

/// Challenges whenever it may, opens with the lowest bid otherwise.
#[derive(Debug, Default)]
pub struct AlwaysChallenge;

impl Strategy for AlwaysChallenge {
    fn action(&mut self, game: &Match) -> Action {
        if game.is_legal(&Action::challenge()) {
            Action::challenge()
        } else {
            Action::Bid(Bid::new(MIN_BID_FACE, 1))
        }
    }
}

/// Always raises by the smallest legal step, and challenges at the top of the ladder.
#[derive(Debug, Default)]
pub struct MinimumRaise;

impl Strategy for MinimumRaise {
    fn action(&mut self, game: &Match) -> Action {
        match next_minimum_bid(game.last_bid()) {
            Some(bid) if game.is_legal(&Action::Bid(bid)) => Action::Bid(bid),
            _ => Action::challenge(),
        }
    }
}

/// Estimates the table from its own dice, assuming a third of the hidden dice match any face.
///
/// Raises the count when the estimate supports it, otherwise moves to the next face.
#[derive(Debug, Default)]
pub struct Timid;

impl Strategy for Timid {
    fn action(&mut self, game: &Match) -> Action {
        let Some(previous) = game.last_bid().copied() else {
            return Action::Bid(Bid::new(MIN_BID_FACE, 1));
        };

        let own_dice = game.current_seat().faces.len();
        let hidden_dice = game.dice_count() - own_dice;
        let expected = (hidden_dice as f32 / 3.0).round() as i32 + game.face_count(previous.face) as i32;

        let candidate = if expected > previous.min_count || previous.face == MAX_BID_FACE {
            Action::bid(previous.face, previous.min_count + 1)
        } else {
            Action::bid(previous.face + 1, previous.min_count)
        };
        if game.is_legal(&candidate) {
            candidate
        } else {
            Action::challenge()
        }
    }
}

/// Decodes a response the way the referee does. Handy to test a strategy end to end.
pub fn parse_action(line: &str) -> anyhow::Result<Action> {
    decode_action(line).context("invalid action")
}
