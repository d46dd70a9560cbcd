//! Plays one set: matches among a fixed group of competitors until one remains.
//!
//! Competitors are ranked by elimination order. Those eliminated by the same match share
//! the mean of the ranks they jointly occupy, see [`LoserGroups::score_of`].

use std::{collections::BTreeMap, fmt::Display, sync::Arc};

use rand::{seq::SliceRandom, Rng};
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::{
    channel::{ChannelLauncher, CompetitorChannel},
    competitor::Competitor,
    history::History,
    match_runner::{play_match, Contender, Ending},
    report::Report,
};

/// Dice held by every competitor when a set starts.
pub const STARTING_DICE: i32 = 5;
/// Largest group of competitors playing a set together.
pub const MAX_PARTICIPANTS: usize = 6;

/// Internal inconsistency. Aborts the current set only.
#[derive(Debug, Error)]
pub enum InvariantViolation {
    #[error("{0} is in no elimination batch")]
    NeverEliminated(String),
    #[error("{0} holds dice but has no channel")]
    MissingChannel(String),
}

/// Elimination batches, first eliminated first. The winner is the last batch.
#[derive(Debug, Clone, PartialEq)]
pub struct LoserGroups<K> {
    batches: Vec<Vec<K>>,
}

impl<K> Default for LoserGroups<K> {
    fn default() -> Self {
        LoserGroups { batches: vec![] }
    }
}

impl<K: PartialEq + Display> LoserGroups<K> {
    pub fn new() -> LoserGroups<K> {
        LoserGroups::default()
    }

    pub fn from_batches(batches: Vec<Vec<K>>) -> LoserGroups<K> {
        LoserGroups { batches }
    }

    pub fn batches(&self) -> &[Vec<K>] {
        &self.batches
    }

    /// Records competitors eliminated together.
    ///
    /// `k` competitors going out at once are preceded by `k - 1` empty batches, so that
    /// the batch index keeps counting competitors rather than events.
    pub fn eliminate(&mut self, batch: Vec<K>) {
        if batch.is_empty() {
            return;
        }
        for _ in 1..batch.len() {
            self.batches.push(vec![]);
        }
        self.batches.push(batch);
    }

    /// Records the last competitor standing.
    pub fn crown(&mut self, winner: K) {
        self.batches.push(vec![winner]);
    }

    /// Mean of the `k` consecutive ranks ending at the batch index `i`, with `k` the batch size:
    /// `(i + (i - 1) + .. + (i - k + 1)) / k`.
    pub fn score_of(&self, key: &K) -> Result<f64, InvariantViolation> {
        self.batches
            .iter()
            .enumerate()
            .rev()
            .find(|(_, batch)| batch.contains(key))
            .map(|(index, batch)| index as f64 - (batch.len() as f64 - 1.0) / 2.0)
            .ok_or_else(|| InvariantViolation::NeverEliminated(key.to_string()))
    }
}

/// Why a competitor was penalized during a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyKind {
    /// The process could not be started.
    LaunchFailure,
    /// `check_other_programs` failed, the competitor sat the set out.
    BriefingFailure,
    IllegalAction,
    CommunicationFailure,
    /// `game_end` failed, the competitor lost all its dice.
    GameEndFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Penalty {
    pub competitor: String,
    pub kind: PenaltyKind,
}

#[derive(Debug)]
pub struct SetResult {
    /// In participant order.
    pub scores: Vec<(Arc<Competitor>, f64)>,
    pub losers: LoserGroups<Arc<Competitor>>,
    pub matches_played: usize,
    pub penalties: Vec<Penalty>,
    /// Stderr of every competitor that could be launched, in participant order.
    pub logs: Vec<(Arc<Competitor>, String)>,
}

/// Alias of the participant at `index`: `A`, `B`, ...
pub fn alias(index: usize) -> String {
    let letter = char::from(b'A' + (index % 26) as u8);
    if index < 26 {
        letter.to_string()
    } else {
        format!("{letter}{}", index / 26)
    }
}

/// Plays a whole set among `participants`, who must be distinct.
///
/// Every match is appended to `history`. Aliases follow the order of `participants`,
/// so callers shuffle it first.
#[instrument(skip_all, fields(participants = participants.len()))]
pub fn play_set<L, R>(
    participants: &[Arc<Competitor>],
    launcher: &mut L,
    history: &mut History,
    rng: &mut R,
    report: &Report,
) -> Result<SetResult, InvariantViolation>
where
    L: ChannelLauncher,
    R: Rng + ?Sized,
{
    let aliases = (0..participants.len()).map(alias).collect::<Vec<_>>();
    let mut dice = vec![STARTING_DICE; participants.len()];
    let mut losers = LoserGroups::new();
    let mut penalties = vec![];
    let mut penalize = |competitor: &Arc<Competitor>, kind| {
        penalties.push(Penalty {
            competitor: competitor.name.clone(),
            kind,
        })
    };

    let careers = history.careers(
        participants
            .iter()
            .zip(&aliases)
            .map(|(competitor, alias)| (competitor.name.as_str(), alias.as_str())),
    );

    let mut channels = Vec::with_capacity(participants.len());
    for (index, competitor) in participants.iter().enumerate() {
        let channel = match launcher.launch(competitor) {
            Ok(mut channel) => match channel.notify_careers(&careers) {
                Ok(()) => Some(channel),
                Err(e) => {
                    warn!(competitor = %competitor, "briefing failed, sitting out the set: {e}");
                    penalize(competitor, PenaltyKind::BriefingFailure);
                    dice[index] = 0;
                    losers.eliminate(vec![competitor.clone()]);
                    Some(channel)
                }
            },
            Err(e) => {
                warn!(competitor = %competitor, "could not launch: {e:#}");
                penalize(competitor, PenaltyKind::LaunchFailure);
                dice[index] = 0;
                losers.eliminate(vec![competitor.clone()]);
                None
            }
        };
        channels.push(channel);
    }

    let mut matches_played = 0;
    while dice.iter().filter(|&&count| count > 0).count() > 1 {
        let mut seated = (0..participants.len())
            .filter(|&index| dice[index] > 0)
            .collect::<Vec<_>>();
        seated.shuffle(rng);

        let outcome = {
            let mut slots = channels.iter_mut().map(Option::as_mut).collect::<Vec<_>>();
            let mut contenders = Vec::with_capacity(seated.len());
            for &index in &seated {
                let channel = slots[index].take().ok_or_else(|| {
                    InvariantViolation::MissingChannel(participants[index].name.clone())
                })?;
                contenders.push(Contender {
                    alias: aliases[index].as_str(),
                    dice: dice[index] as usize,
                    channel,
                });
            }
            play_match(&mut contenders, rng)
        };
        matches_played += 1;

        match &outcome.ending {
            Ending::Resolved => {}
            Ending::IllegalAction { seat, action } => {
                let competitor = &participants[seated[*seat]];
                warn!(competitor = %competitor, alias = %aliases[seated[*seat]], %action, "illegal action");
                penalize(competitor, PenaltyKind::IllegalAction);
            }
            Ending::CommunicationFailure { seat, error } => {
                let competitor = &participants[seated[*seat]];
                warn!(competitor = %competitor, alias = %aliases[seated[*seat]], %error, "communication failure");
                penalize(competitor, PenaltyKind::CommunicationFailure);
            }
        }
        report.print_match(
            &outcome,
            &seated
                .iter()
                .map(|&index| participants[index].as_ref())
                .collect::<Vec<_>>(),
        );

        for &index in &seated {
            let Some(channel) = channels[index].as_mut() else {
                continue;
            };
            if let Err(e) = channel.notify_match_end(&outcome.game) {
                warn!(competitor = %participants[index], "match end notification failed: {e}");
                penalize(&participants[index], PenaltyKind::GameEndFailure);
                dice[index] = dice[index].min(0);
            }
        }

        history.push(
            seated
                .iter()
                .map(|&index| (participants[index].name.clone(), aliases[index].clone()))
                .collect::<BTreeMap<_, _>>(),
            outcome.game,
        );

        for (&index, delta) in seated.iter().zip(&outcome.deltas) {
            dice[index] += delta;
        }
        let eliminated = seated
            .iter()
            .filter(|&&index| dice[index] <= 0)
            .map(|&index| participants[index].clone())
            .collect::<Vec<_>>();
        if !eliminated.is_empty() {
            debug!(eliminated = ?eliminated.iter().map(|c| c.name.as_str()).collect::<Vec<_>>());
        }
        losers.eliminate(eliminated);
    }

    if let Some(index) = (0..participants.len()).find(|&index| dice[index] > 0) {
        losers.crown(participants[index].clone());
    }

    for channel in channels.iter_mut().flatten() {
        channel.terminate();
    }
    let logs = participants
        .iter()
        .zip(channels.iter_mut())
        .filter_map(|(competitor, channel)| {
            channel
                .as_mut()
                .map(|channel| (competitor.clone(), channel.drain_stderr()))
        })
        .collect::<Vec<_>>();
    report.print_logs(&logs);

    let scores = participants
        .iter()
        .map(|competitor| Ok((competitor.clone(), losers.score_of(competitor)?)))
        .collect::<Result<Vec<_>, InvariantViolation>>()
        .inspect_err(|e| error!("{e}"))?;

    Ok(SetResult {
        scores,
        losers,
        matches_played,
        penalties,
        logs,
    })
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        game::Action,
        testing::{competitors, ScriptedChannel, ScriptedLauncher},
    };

    fn scores(result: &SetResult) -> Vec<(&str, f64)> {
        result
            .scores
            .iter()
            .map(|(competitor, score)| (competitor.name.as_str(), *score))
            .collect()
    }

    fn play(
        names: &[&str],
        launcher: &mut ScriptedLauncher,
        history: &mut History,
        seed: u64,
    ) -> SetResult {
        play_set(
            &competitors(names),
            launcher,
            history,
            &mut StdRng::seed_from_u64(seed),
            &Report::silent(),
        )
        .unwrap()
    }

    #[test]
    fn singletons_score_by_elimination_order() {
        let losers = LoserGroups::from_batches(vec![vec!["a"], vec!["b"], vec!["c"]]);
        assert_eq!(losers.score_of(&"a").unwrap(), 0.0);
        assert_eq!(losers.score_of(&"b").unwrap(), 1.0);
        assert_eq!(losers.score_of(&"c").unwrap(), 2.0);
    }

    #[test]
    fn tied_losers_share_their_ranks() {
        let losers = LoserGroups::from_batches(vec![vec!["a", "b"], vec!["c"]]);
        assert_eq!(losers.score_of(&"a").unwrap(), -0.5);
        assert_eq!(losers.score_of(&"b").unwrap(), -0.5);
        assert_eq!(losers.score_of(&"c").unwrap(), 1.0);
    }

    #[test]
    fn simultaneous_eliminations_are_padded() {
        let mut losers = LoserGroups::new();
        losers.eliminate(vec![]);
        losers.eliminate(vec!["a", "b"]);
        losers.crown("c");
        assert_eq!(losers.batches(), &[vec![], vec!["a", "b"], vec!["c"]]);
        assert_eq!(losers.score_of(&"a").unwrap(), 0.5);
        assert_eq!(losers.score_of(&"c").unwrap(), 2.0);
    }

    #[test]
    fn unknown_competitor_is_an_invariant_violation() {
        let losers = LoserGroups::from_batches(vec![vec!["a"]]);
        assert!(matches!(
            losers.score_of(&"z"),
            Err(InvariantViolation::NeverEliminated(name)) if name == "z"
        ));
    }

    #[test]
    fn aliases() {
        assert_eq!(alias(0), "A");
        assert_eq!(alias(5), "F");
        assert_eq!(alias(27), "B1");
    }

    #[test]
    fn two_competitors_play_to_the_end() {
        let mut launcher = ScriptedLauncher::new()
            .with("challenger", ScriptedChannel::challenger)
            .with("climber", ScriptedChannel::climber);
        let mut history = History::new();
        let result = play(&["challenger", "climber"], &mut launcher, &mut history, 42);

        assert!(result.matches_played >= 1 && result.matches_played <= 9);
        assert_eq!(history.len(), result.matches_played);
        let mut values = scores(&result).iter().map(|(_, s)| *s).collect::<Vec<_>>();
        values.sort_by(f64::total_cmp);
        assert_eq!(values, vec![0.0, 1.0]);
        assert!(result.penalties.is_empty());
        assert_eq!(launcher.launched, vec!["challenger", "climber"]);

        for past in history.matches() {
            assert_eq!(past.ids["challenger"], "A");
            assert_eq!(past.ids["climber"], "B");
        }
    }

    #[test]
    fn same_seed_same_set() {
        let run = |seed| {
            let mut launcher = ScriptedLauncher::new()
                .with("challenger", ScriptedChannel::challenger)
                .with("climber", ScriptedChannel::climber)
                .with("timid", || ScriptedChannel::playing(crate::strategy::Timid));
            let mut history = History::new();
            let result = play(&["timid", "challenger", "climber"], &mut launcher, &mut history, seed);
            let scores = scores(&result)
                .into_iter()
                .map(|(name, score)| (name.to_string(), score))
                .collect::<Vec<_>>();
            (scores, history.matches().to_vec())
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn failed_briefing_sits_the_set_out() {
        let mut launcher = ScriptedLauncher::new()
            .with("deaf", || ScriptedChannel::climber().failing_briefing())
            .with("challenger", ScriptedChannel::challenger)
            .with("climber", ScriptedChannel::climber);
        let mut history = History::new();
        let result = play(&["challenger", "deaf", "climber"], &mut launcher, &mut history, 3);

        let first_out = result.losers.batches()[0]
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(first_out, vec!["deaf"]);
        assert_eq!(scores(&result)[1], ("deaf", 0.0));
        assert_eq!(
            result.penalties,
            vec![Penalty {
                competitor: "deaf".into(),
                kind: PenaltyKind::BriefingFailure
            }]
        );
        assert!(history.matches().iter().all(|past| !past.ids.contains_key("deaf")));
        // still terminated and drained
        assert_eq!(result.logs.len(), 3);
    }

    #[test]
    fn launch_failure_sits_the_set_out() {
        let mut launcher = ScriptedLauncher::new()
            .with("challenger", ScriptedChannel::challenger)
            .with("climber", ScriptedChannel::climber);
        let mut history = History::new();
        let result = play(&["ghost", "challenger", "climber"], &mut launcher, &mut history, 3);

        assert_eq!(scores(&result)[0], ("ghost", 0.0));
        assert_eq!(result.penalties[0].kind, PenaltyKind::LaunchFailure);
        assert_eq!(
            result
                .logs
                .iter()
                .map(|(c, _)| c.name.as_str())
                .collect::<Vec<_>>(),
            vec!["challenger", "climber"]
        );
    }

    #[test]
    fn illegal_action_eliminates_the_offender() {
        let mut launcher = ScriptedLauncher::new()
            .with("reckless", || ScriptedChannel::new(|_| Ok(Action::bid(7, 1))))
            .with("climber", ScriptedChannel::climber)
            .with("climber2", ScriptedChannel::climber);
        let mut history = History::new();
        let result = play(&["climber", "reckless", "climber2"], &mut launcher, &mut history, 5);

        // climbers never challenge early, so reckless always gets to play in the first match
        assert_eq!(result.matches_played, 2);
        assert_eq!(scores(&result)[1], ("reckless", 0.0));
        assert_eq!(
            result.penalties,
            vec![Penalty {
                competitor: "reckless".into(),
                kind: PenaltyKind::IllegalAction
            }]
        );
        let first = &history.matches()[0].game;
        assert_eq!(first.seats.len(), 3);
    }

    /// Opens with the highest possible bid, challenges when it cannot.
    fn bluffer() -> ScriptedChannel {
        ScriptedChannel::new(|game| {
            let bid = Action::bid(6, 20);
            Ok(if game.is_legal(&bid) { bid } else { Action::challenge() })
        })
    }

    #[test]
    fn failed_match_end_eliminates_together() {
        // The first bluffer to act bids (6, 20) and loses at least 5 dice whoever
        // challenges. The other one fails its match end notification.
        let mut launcher = ScriptedLauncher::new()
            .with("bluffer1", || bluffer().failing_game_end())
            .with("bluffer2", || bluffer().failing_game_end())
            .with("challenger", ScriptedChannel::challenger);
        let mut history = History::new();
        let result = play(&["bluffer1", "challenger", "bluffer2"], &mut launcher, &mut history, 11);

        assert_eq!(result.matches_played, 1);
        assert_eq!(
            scores(&result),
            vec![("bluffer1", 0.5), ("challenger", 2.0), ("bluffer2", 0.5)]
        );
        assert_eq!(result.losers.batches().len(), 3);
        assert!(result.losers.batches()[0].is_empty());
        assert_eq!(
            result
                .penalties
                .iter()
                .filter(|p| p.kind == PenaltyKind::GameEndFailure)
                .count(),
            2
        );
    }

    #[test]
    fn nobody_left_means_no_winner() {
        let mut launcher = ScriptedLauncher::new()
            .with("a", || ScriptedChannel::challenger().failing_game_end())
            .with("b", || ScriptedChannel::challenger().failing_game_end());
        let mut history = History::new();
        let result = play(&["a", "b"], &mut launcher, &mut history, 1);

        assert_eq!(result.matches_played, 1);
        assert_eq!(result.losers.batches().len(), 2);
        assert_eq!(scores(&result), vec![("a", 0.5), ("b", 0.5)]);
    }

    #[test]
    fn lone_participant_wins_without_playing() {
        let mut launcher = ScriptedLauncher::new().with("solo", ScriptedChannel::challenger);
        let mut history = History::new();
        let result = play(&["solo"], &mut launcher, &mut history, 1);
        assert_eq!(result.matches_played, 0);
        assert_eq!(scores(&result), vec![("solo", 0.0)]);
    }

    #[test]
    fn stderr_is_collected_after_termination() {
        let mut launcher = ScriptedLauncher::new()
            .with("chatty", || ScriptedChannel::challenger().with_stderr("thinking\n"))
            .with("climber", ScriptedChannel::climber);
        let mut history = History::new();
        let result = play(&["chatty", "climber"], &mut launcher, &mut history, 2);
        assert_eq!(result.logs[0].1, "thinking\n");
        assert_eq!(result.logs[1].1, "");
    }

    #[test]
    fn careers_carry_previous_sets() {
        let briefings = Rc::new(RefCell::new(vec![]));
        let log = briefings.clone();
        let mut launcher = ScriptedLauncher::new()
            .with("challenger", move || {
                ScriptedChannel::challenger().recording_briefings(log.clone())
            })
            .with("climber", ScriptedChannel::climber);
        let mut history = History::new();
        let first = play(&["challenger", "climber"], &mut launcher, &mut history, 8);
        play(&["climber", "challenger"], &mut launcher, &mut history, 9);

        let briefings = briefings.borrow();
        assert_eq!(briefings.len(), 2);
        assert!(briefings[0].iter().all(|career| career.career_records.is_empty()));

        let second = &briefings[1];
        assert_eq!(
            second.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        // climber was B in the first set
        assert_eq!(second[0].career_records.len(), first.matches_played);
        assert!(second[0].career_records.iter().all(|r| r.id == "B"));
        assert!(second[1].career_records.iter().all(|r| r.id == "A"));
        assert_eq!(
            second[0].career_records[0].game,
            history.matches()[first.matches_played - 1].game
        );
    }
}
