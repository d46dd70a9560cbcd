//! Repeated sets among random groups until every competitor has played enough.

use std::sync::Arc;

use anyhow::bail;
use rand::{
    seq::{index, SliceRandom},
    Rng,
};
use tracing::{error, info, instrument};

use crate::{
    channel::ChannelLauncher,
    competitor::Competitor,
    history::History,
    report::Report,
    set_runner::{alias, play_set, InvariantViolation, SetResult, MAX_PARTICIPANTS},
};

/// Sets aborted in a row before giving up on the championship.
pub const MAX_CONSECUTIVE_ABORTED_SETS: usize = 10;

/// Running average of a competitor's set scores.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Evaluation {
    total_score: f64,
    set_count: usize,
}

impl Evaluation {
    pub fn add_score(&mut self, score: f64) {
        self.total_score += score;
        self.set_count += 1;
    }

    pub fn set_count(&self) -> usize {
        self.set_count
    }

    pub fn total_score(&self) -> f64 {
        self.total_score
    }

    /// Average score, `None` before the first set.
    pub fn value(&self) -> Option<f64> {
        (self.set_count > 0).then(|| self.total_score / self.set_count as f64)
    }
}

pub struct Championship<L, R> {
    competitors: Vec<Arc<Competitor>>,
    evaluations: Vec<Evaluation>,
    launcher: L,
    rng: R,
    history: History,
    report: Report,
    sets_played: usize,
    aborted_sets: usize,
}

impl<L: ChannelLauncher, R: Rng> Championship<L, R> {
    pub fn new(
        competitors: Vec<Arc<Competitor>>,
        launcher: L,
        rng: R,
        report: Report,
    ) -> Championship<L, R> {
        Championship {
            evaluations: vec![Evaluation::default(); competitors.len()],
            competitors,
            launcher,
            rng,
            history: History::new(),
            report,
            sets_played: 0,
            aborted_sets: 0,
        }
    }

    /// Plays sets until every competitor took part in at least `min_set_count` of them.
    ///
    /// A set aborted by an [`InvariantViolation`] counts for nobody. The championship
    /// only fails if too many sets in a row are aborted.
    #[instrument(skip(self), fields(competitors = self.competitors.len()))]
    pub fn play(&mut self, min_set_count: usize) -> anyhow::Result<()> {
        let mut consecutive_aborts = 0;
        while self
            .evaluations
            .iter()
            .any(|evaluation| evaluation.set_count() < min_set_count)
        {
            match self.play_one_set() {
                Ok(_) => consecutive_aborts = 0,
                Err(e) => {
                    error!("set aborted: {e}");
                    consecutive_aborts += 1;
                    if consecutive_aborts >= MAX_CONSECUTIVE_ABORTED_SETS {
                        bail!("{consecutive_aborts} sets aborted in a row, last one: {e}");
                    }
                }
            }
            self.report.print_leaderboard(&self.standings());
        }
        info!(
            sets = self.sets_played,
            aborted = self.aborted_sets,
            matches = self.history.len(),
            "championship over"
        );
        Ok(())
    }

    /// Samples up to [`MAX_PARTICIPANTS`] competitors, shuffles them and plays a set.
    pub fn play_one_set(&mut self) -> Result<SetResult, InvariantViolation> {
        let amount = self.competitors.len().min(MAX_PARTICIPANTS);
        let mut sampled = index::sample(&mut self.rng, self.competitors.len(), amount).into_vec();
        sampled.shuffle(&mut self.rng);

        let participants = sampled
            .iter()
            .map(|&i| self.competitors[i].clone())
            .collect::<Vec<_>>();
        self.sets_played += 1;
        let aliases = (0..participants.len()).map(alias).collect::<Vec<_>>();
        let seated = participants
            .iter()
            .map(|competitor| competitor.as_ref())
            .zip(aliases.iter().map(String::as_str))
            .collect::<Vec<_>>();
        self.report.print_set_start(self.sets_played, &seated);

        let result = play_set(
            &participants,
            &mut self.launcher,
            &mut self.history,
            &mut self.rng,
            &self.report,
        )
        .inspect_err(|_| self.aborted_sets += 1)?;

        // scores are in participant order
        for (&i, (_, score)) in sampled.iter().zip(&result.scores) {
            self.evaluations[i].add_score(*score);
        }
        Ok(result)
    }

    pub fn evaluations(&self) -> impl Iterator<Item = (&Arc<Competitor>, &Evaluation)> {
        self.competitors.iter().zip(&self.evaluations)
    }

    /// `(name, average score)` of every competitor, in discovery order.
    pub fn standings(&self) -> Vec<(String, Option<f64>)> {
        self.evaluations()
            .map(|(competitor, evaluation)| (competitor.name.clone(), evaluation.value()))
            .collect()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn sets_played(&self) -> usize {
        self.sets_played
    }
}
