//! Log of every match played during a championship, and the careers built from it.
//!
//! Competitors only ever see per-set aliases. The log remembers which competitor held
//! which alias in each match, so a competitor's past can be handed to its next
//! opponents without revealing who it really is.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::game::Match;

/// Upper bound on the number of matches in one career.
pub const MAX_CAREER_RECORDS: usize = 100;

/// One past match, tagged with the alias the described competitor held in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareerRecord {
    pub id: String,
    pub game: Match,
}

/// Dossier on one competitor of the current set, most recent match first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Career {
    /// Alias of the competitor in the current set.
    pub id: String,
    pub career_records: Vec<CareerRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastMatch {
    /// Competitor name -> alias held in `game`.
    pub ids: BTreeMap<String, String>,
    pub game: Match,
}

#[derive(Debug, Default)]
pub struct History {
    matches: Vec<PastMatch>,
}

impl History {
    pub fn new() -> History {
        History::default()
    }

    pub fn push(&mut self, ids: BTreeMap<String, String>, game: Match) {
        self.matches.push(PastMatch { ids, game });
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn matches(&self) -> &[PastMatch] {
        &self.matches
    }

    /// Up to [`MAX_CAREER_RECORDS`] most recent matches `name` took part in.
    pub fn career(&self, name: &str, alias: &str) -> Career {
        let career_records = self
            .matches
            .iter()
            .rev()
            .filter_map(|past| {
                past.ids.get(name).map(|id| CareerRecord {
                    id: id.clone(),
                    game: past.game.clone(),
                })
            })
            .take(MAX_CAREER_RECORDS)
            .collect();
        Career {
            id: alias.to_string(),
            career_records,
        }
    }

    /// One career per `(name, alias)` pair, in the given order.
    pub fn careers<'a, I>(&self, participants: I) -> Vec<Career>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        participants
            .into_iter()
            .map(|(name, alias)| self.career(name, alias))
            .collect()
    }

    /// Writes the whole log as a JSON array.
    #[instrument(skip(self))]
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)
            .with_context(|| format!("could not create '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.matches).context("could not write history")?;
        writer.flush().context("could not flush history")?;
        info!(matches = self.matches.len(), "history saved");
        Ok(())
    }
}
