//! Entry point of the referee.
//!
//! The [`Dealer`] ties everything together:
//!
//! - discovering competitors in a directory (see [`collect_competitors`])
//! - launching them under the limits of [`Constraints`]
//! - running a [`Championship`] until every competitor played enough sets
//! - saving the history of every match
//!
//! # Behavior & Configuration
//!
//! Behavior is controlled by a [`Configuration`] object. With `config.contain` set,
//! competitors run inside a Linux cgroup v2 limiting their memory and CPUs; if cgroups are
//! unavailable, launching fails unless `config.allow_uncontained` is also set. Only
//! timeouts are enforced for uncontained competitors.
//!
//! # Example
//!
//! ```no_run
//! use liars_dice::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new().with_allow_uncontained(true).with_seed(42);
//!     let constraints = ConstraintsBuilder::new().with_ram_per_competitor(500).build()?;
//!
//!     let standings = Dealer::new(config, constraints).evaluate("competitors", 10)?;
//!     for (name, score) in standings {
//!         println!("{name}: {score:?}");
//!     }
//!     Ok(())
//! }
//! ```

use std::{path::Path, sync::Arc};

use anyhow::Context;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{info, instrument, trace, warn};

use crate::{
    championship::Championship,
    channel::ProcessLauncher,
    competitor::Competitor,
    competitor_collector::collect_competitors,
    configuration::Configuration,
    constraints::Constraints,
    logger::init_logger,
    report::{best_first, Report},
};

pub struct Dealer {
    config: Configuration,
    constraints: Constraints,
}

impl Dealer {
    /// Create a [`Dealer`]. Installs the file logger if `config` asks for it.
    #[instrument(skip_all)]
    pub fn new(config: Configuration, constraints: Constraints) -> Dealer {
        if config.log {
            if let Err(e) = init_logger() {
                eprintln!("could not set up logging: {e:#}");
            }
        }
        trace!(?config, ?constraints);

        Dealer {
            config,
            constraints,
        }
    }

    /// Plays a championship between the competitors found in `directory`.
    ///
    /// Returns `(name, average score)` per competitor, best first.
    ///
    /// # Errors
    /// Returns an error if the directory is invalid or if the championship cannot proceed.
    pub fn evaluate(
        &self,
        directory: impl AsRef<Path>,
        min_set_count: usize,
    ) -> anyhow::Result<Vec<(String, Option<f64>)>> {
        let competitors = collect_competitors(directory.as_ref(), self.config.verbose)?;
        info!(competitors = ?competitors.iter().map(|c| c.name.as_str()).collect::<Vec<_>>());
        if competitors.is_empty() {
            warn!("no competitor found in '{}'", directory.as_ref().display());
        }
        self.play_championship(competitors, min_set_count)
    }

    /// Plays a championship between `competitors`, who must be distinct.
    pub fn play_championship(
        &self,
        competitors: Vec<Arc<Competitor>>,
        min_set_count: usize,
    ) -> anyhow::Result<Vec<(String, Option<f64>)>> {
        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let launcher = ProcessLauncher::new(self.config.clone(), self.constraints.clone());
        let mut championship =
            Championship::new(competitors, launcher, rng, Report::from_config(&self.config));

        let played = championship.play(min_set_count);

        // saved even if the championship failed
        if let Some(path) = self.config.history_file() {
            championship
                .history()
                .save(path)
                .with_context(|| format!("could not save history to '{}'", path.display()))?;
        }
        played?;

        let mut standings = championship.standings();
        standings.sort_by(|a, b| best_first(a.1, b.1));
        Ok(standings)
    }
}
