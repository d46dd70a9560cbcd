//! # Liar's Dice
//!
//! A referee for Liar's Dice championships between programs.
//!
//! It provides:
//! - The rules of a match (see [`game`])
//! - Sets: matches among up to six competitors until one of them remains (see [`set_runner`])
//! - Championships: sets among randomly sampled competitors, until everyone played enough
//!   (see [`championship`])
//! - Sandboxed execution of competitors through Linux cgroups v2, and strict timeouts
//!
//! Competitors are separate processes talking to the referee over stdin/stdout (see
//! [`protocol`]). They never learn who they play against: every set hands out fresh
//! aliases, and each competitor receives the careers of its opponents under those aliases.
//!
//! # Documentation Overview
//!
//! - To run a championship, see the [`dealer`] module.
//! - For configuring the referee, resource limits and timeouts, see
//!   [`Configuration`](crate::configuration::Configuration) and [`constraints`].
//! - To write a competitor in Rust, see the [`strategy`] module.
//!
//! # Scoring
//!
//! Within a set, competitors are ranked by elimination order, starting at 0 for the first
//! one out. Competitors eliminated by the same match share the mean of the ranks they
//! occupy together. A competitor's championship score is the average of its set scores.
//!
//! # Usage Example
//!
//! ```no_run
//! use std::time::Duration;
//! use liars_dice::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let constraints = ConstraintsBuilder::new()
//!         .with_ram_per_competitor(500) // in MB
//!         .with_action_timeout(Duration::from_millis(500))
//!         .build()?;
//!
//!     // run without cgroups if they are not available
//!     let config = Configuration::new().with_allow_uncontained(true);
//!
//!     let dealer = Dealer::new(config, constraints);
//!     for (name, score) in dealer.evaluate("path_to_competitors_directory", 10)? {
//!         println!("{name}: {score:?}");
//!     }
//!     Ok(())
//! }
//! ```

mod cgroup_manager;
pub use anyhow;
pub mod championship;
pub mod channel;
pub mod competitor;
pub mod competitor_collector;
pub mod configuration;
pub mod constraints;
pub mod dealer;
pub mod game;
pub mod history;
mod logger;
pub mod match_runner;
pub mod protocol;
pub mod report;
pub mod set_runner;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

/// Commonly used types and traits for quick access.
///
/// ```rust
/// use liars_dice::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::constraints::ConstraintsBuilder;
    pub use crate::dealer::Dealer;
    pub use crate::game::{Action, Bid, Match};
    pub use crate::strategy::{run_stdio, Strategy};
}
