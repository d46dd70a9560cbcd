//! Human-readable report printed on stdout while the championship runs.
//!
//! Competitors are shown by nickname (see [`Competitor::nickname`]), never by alias.

use std::{cmp::Ordering, fmt::Write, sync::Arc};

use crate::{
    competitor::Competitor,
    configuration::Configuration,
    game::{Match, MAX_BID_FACE, MIN_BID_FACE},
    match_runner::{Ending, MatchOutcome},
};

#[derive(Debug, Clone, Copy)]
pub struct Report {
    verbose: bool,
    show_logs: bool,
}

impl Report {
    pub fn new(verbose: bool, show_logs: bool) -> Report {
        Report { verbose, show_logs }
    }

    pub fn from_config(config: &Configuration) -> Report {
        Report::new(config.verbose, config.verbose && config.show_competitor_logs)
    }

    pub fn silent() -> Report {
        Report::new(false, false)
    }

    pub fn print_set_start(&self, set_number: usize, seated: &[(&Competitor, &str)]) {
        if !self.verbose {
            return;
        }
        let aliases = seated
            .iter()
            .map(|(competitor, alias)| format!("{alias}={competitor}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("\x1b[32m## Set {set_number}:\x1b[39m {aliases}\n");
    }

    /// `seated[i]` is the competitor at seat `i` of the match.
    pub fn print_match(&self, outcome: &MatchOutcome, seated: &[&Competitor]) {
        if !self.verbose {
            return;
        }
        let nicknames = seated.iter().map(|c| c.nickname()).collect::<Vec<_>>();
        print!("{}", format_match(&outcome.game, &outcome.deltas, &nicknames));
        match &outcome.ending {
            Ending::Resolved => {}
            Ending::IllegalAction { seat, action } => {
                println!("\x1b[31m{}: illegal action ({action})\x1b[39m\n", nicknames[*seat])
            }
            Ending::CommunicationFailure { seat, error } => {
                println!("\x1b[31m{}: communication failure ({error})\x1b[39m\n", nicknames[*seat])
            }
        }
    }

    /// `standings` is `(name, average score)`; competitors without a score are listed last.
    pub fn print_leaderboard(&self, standings: &[(String, Option<f64>)]) {
        if self.verbose {
            print!("{}", format_leaderboard(standings));
        }
    }

    pub fn print_logs(&self, logs: &[(Arc<Competitor>, String)]) {
        if self.show_logs {
            print!("{}", format_logs(logs));
        }
    }
}

pub fn format_match(game: &Match, deltas: &[i32], nicknames: &[String]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Dice\n");
    for (nickname, seat) in nicknames.iter().zip(&game.seats) {
        let faces = seat
            .faces
            .iter()
            .map(|face| face.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "{nickname}\t{faces}");
    }

    let _ = writeln!(out, "\n# Counts\n");
    for face in MIN_BID_FACE..=MAX_BID_FACE {
        let _ = writeln!(out, "{face} = {}", game.face_count(face));
    }

    // interleaved in turn order: round by round, seat by seat
    let _ = writeln!(out, "\n# Actions\n");
    let rounds = game.seats.iter().map(|seat| seat.actions.len()).max().unwrap_or(0);
    for round in 0..rounds {
        for (nickname, seat) in nicknames.iter().zip(&game.seats) {
            if let Some(action) = seat.actions.get(round) {
                let _ = writeln!(out, "{nickname}\t{action}");
            }
        }
    }

    let _ = writeln!(out, "\n# Results\n");
    for (nickname, delta) in nicknames.iter().zip(deltas) {
        let _ = writeln!(out, "{nickname}\t{delta}");
    }
    out.push('\n');
    out
}

/// Ordering of scores, highest first, missing scores last.
pub fn best_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (a, b) => b.is_some().cmp(&a.is_some()),
    }
}

/// Sorted by descending score, 3 decimals.
pub fn format_leaderboard(standings: &[(String, Option<f64>)]) -> String {
    let mut sorted = standings
        .iter()
        .map(|(name, score)| (name.chars().take(7).collect::<String>(), *score))
        .collect::<Vec<_>>();
    sorted.sort_by(|a, b| best_first(a.1, b.1));

    let mut out = String::from("# Scores\n\n");
    for (nickname, score) in sorted {
        let _ = match score {
            Some(score) => writeln!(out, "{nickname}\t{score:.3}"),
            None => writeln!(out, "{nickname}\t-"),
        };
    }
    out.push('\n');
    out
}

pub fn format_logs(logs: &[(Arc<Competitor>, String)]) -> String {
    let mut out = String::from("# Logs\n\n");
    for (competitor, log) in logs {
        let nickname = competitor.nickname();
        for line in log.lines() {
            let _ = writeln!(out, "{nickname}\t{line}");
        }
    }
    out.push('\n');
    out
}
