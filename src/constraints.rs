//! Resource and timing limits applied to competitor processes.
//!
//! The main entry point is the [`ConstraintsBuilder`] struct. Constraints include:
//!
//! - **Timing**: how long a competitor may take to acknowledge its briefing, to choose an
//!   action, to acknowledge the end of a match, and to exit once asked to
//! - **Memory**: max RAM per competitor
//! - **CPU**: which CPUs competitors may run on, and how many each one gets
//!
//! Memory and CPU limits are enforced with Linux cgroups v2, and only when the
//! [`Configuration`](crate::configuration::Configuration) asks for containment.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use liars_dice::constraints::ConstraintsBuilder;
//!
//! let constraints = ConstraintsBuilder::new()
//!     .with_ram_per_competitor(500)
//!     .with_cpu_list("0-5")
//!     .with_action_timeout(Duration::from_millis(500))
//!     .build()
//!     .unwrap();
//! ```

use std::{collections::BTreeSet, env, time::Duration};

use anyhow::{bail, Context};
use tracing::warn;

use crate::set_runner::MAX_PARTICIPANTS;

pub const DEFAULT_BRIEFING_TIMEOUT: Duration = Duration::from_secs(40);
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_GAME_END_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Deadlines of the competitor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// `check_other_programs` acknowledgement
    pub briefing: Duration,
    /// `action` response
    pub action: Duration,
    /// `game_end` acknowledgement
    pub game_end: Duration,
    /// Time left to a process to exit after `terminate`, also bounds stderr collection.
    pub shutdown_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            briefing: DEFAULT_BRIEFING_TIMEOUT,
            action: DEFAULT_ACTION_TIMEOUT,
            game_end: DEFAULT_GAME_END_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

#[derive(Debug, Default)]
enum AutoCpus {
    #[default]
    Auto,
    Count(usize),
    List(String),
}

/// A builder for the limits applied to competitors.
///
/// By default timeouts are the standard ones (see [`Timeouts`]), every physical CPU
/// of the host is usable with one CPU per competitor, and each competitor may use a sixth
/// of the memory available when the constraints are built.
#[derive(Debug, Default)]
pub struct ConstraintsBuilder {
    competitor_ram: Option<usize>,
    cpus: AutoCpus,
    cpus_per_competitor: Option<usize>,
    briefing_timeout: Option<Duration>,
    action_timeout: Option<Duration>,
    game_end_timeout: Option<Duration>,
    shutdown_grace: Option<Duration>,
}

impl ConstraintsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `ConstraintsBuilder` configured from environment variables.
    ///
    /// Read environment variables are:
    /// - `RAM_PER_COMPETITOR` (usize): maximum RAM per competitor in MB
    /// - `CPU_LIST` (string): comma-separated list or ranges of CPUs, e.g. "0-3,6"
    /// - `TOTAL_CPU_COUNT` (usize): total number of CPUs allowed, overridden by `CPU_LIST`
    /// - `CPUS_PER_COMPETITOR` (usize): number of CPUs allowed per competitor
    /// - `BRIEFING_TIMEOUT_MS`, `ACTION_TIMEOUT_MS`, `GAME_END_TIMEOUT_MS`,
    ///   `SHUTDOWN_GRACE_MS` (u64): timeouts in milliseconds
    #[must_use]
    pub fn from_env() -> Self {
        fn parse_usize(var: &str) -> Option<usize> {
            env::var(var).ok()?.parse().ok()
        }

        fn parse_duration_millis(var: &str) -> Option<Duration> {
            env::var(var)
                .ok()?
                .parse::<u64>()
                .ok()
                .map(Duration::from_millis)
        }

        let cpus = if let Ok(list) = env::var("CPU_LIST") {
            AutoCpus::List(list)
        } else if let Some(count) = parse_usize("TOTAL_CPU_COUNT") {
            AutoCpus::Count(count)
        } else {
            AutoCpus::Auto
        };

        ConstraintsBuilder {
            competitor_ram: parse_usize("RAM_PER_COMPETITOR"),
            cpus,
            cpus_per_competitor: parse_usize("CPUS_PER_COMPETITOR"),
            briefing_timeout: parse_duration_millis("BRIEFING_TIMEOUT_MS"),
            action_timeout: parse_duration_millis("ACTION_TIMEOUT_MS"),
            game_end_timeout: parse_duration_millis("GAME_END_TIMEOUT_MS"),
            shutdown_grace: parse_duration_millis("SHUTDOWN_GRACE_MS"),
        }
    }

    /// Sets the maximum RAM available per competitor (in MB).
    #[must_use]
    pub fn with_ram_per_competitor(self, max: usize) -> Self {
        Self {
            competitor_ram: Some(max),
            ..self
        }
    }

    /// Sets the specific CPUs available for competitors using a CPU list string.
    ///
    /// Format follows the pattern: `"0-3,6,8"` (inclusive ranges and individual IDs).
    #[must_use]
    pub fn with_cpu_list(self, cpus: &str) -> Self {
        Self {
            cpus: AutoCpus::List(cpus.to_string()),
            ..self
        }
    }

    /// Sets the total number of logical CPUs available across all competitors.
    ///
    /// This will be ignored if `with_cpu_list` is also specified.
    #[must_use]
    pub fn with_total_cpu_count(self, max: usize) -> Self {
        if let AutoCpus::List(_) = self.cpus {
            warn!("`with_total_cpu_count` is ignored if `with_cpu_list` is used!");
            self
        } else {
            Self {
                cpus: AutoCpus::Count(max),
                ..self
            }
        }
    }

    #[must_use]
    pub fn with_cpus_per_competitor(self, count: usize) -> Self {
        Self {
            cpus_per_competitor: Some(count),
            ..self
        }
    }

    #[must_use]
    pub fn with_briefing_timeout(self, duration: Duration) -> Self {
        Self {
            briefing_timeout: Some(duration),
            ..self
        }
    }

    /// Sets the maximum duration a competitor may take to choose an action.
    #[must_use]
    pub fn with_action_timeout(self, duration: Duration) -> Self {
        Self {
            action_timeout: Some(duration),
            ..self
        }
    }

    #[must_use]
    pub fn with_game_end_timeout(self, duration: Duration) -> Self {
        Self {
            game_end_timeout: Some(duration),
            ..self
        }
    }

    #[must_use]
    pub fn with_shutdown_grace(self, duration: Duration) -> Self {
        Self {
            shutdown_grace: Some(duration),
            ..self
        }
    }

    /// Consumes the builder and returns the constructed `Constraints`.
    ///
    /// # Errors
    ///
    /// Returns an error when the CPU list cannot be parsed, or when a competitor would get
    /// no CPU or no time at all.
    pub fn build(self) -> anyhow::Result<Constraints> {
        // Physical CPUs only: sharing a core between two competitors halves both.
        let cpus = match self.cpus {
            AutoCpus::Auto => (0..num_cpus::get_physical() as u8).collect::<BTreeSet<u8>>(),
            AutoCpus::Count(count) => (0..count as u8).collect(),
            AutoCpus::List(s) => {
                cpu_list_to_set(&s).map_err(|e| e.context("error parsing cpu list"))?
            }
        };
        let cpus_per_competitor = self.cpus_per_competitor.unwrap_or(1);
        if cpus_per_competitor == 0 || cpus_per_competitor > cpus.len() {
            bail!(
                "cannot give {cpus_per_competitor} CPU(s) per competitor out of {} CPU(s)",
                cpus.len()
            );
        }

        let competitor_ram = self
            .competitor_ram
            .map(|mb| mb * 1_000_000)
            .unwrap_or_else(|| {
                let mut sys = sysinfo::System::new();
                sys.refresh_memory();
                sys.available_memory() as usize / MAX_PARTICIPANTS
            });

        let timeouts = Timeouts {
            briefing: self.briefing_timeout.unwrap_or(DEFAULT_BRIEFING_TIMEOUT),
            action: self.action_timeout.unwrap_or(DEFAULT_ACTION_TIMEOUT),
            game_end: self.game_end_timeout.unwrap_or(DEFAULT_GAME_END_TIMEOUT),
            shutdown_grace: self.shutdown_grace.unwrap_or(DEFAULT_SHUTDOWN_GRACE),
        };
        if [timeouts.briefing, timeouts.action, timeouts.game_end].contains(&Duration::ZERO) {
            bail!("timeouts must be positive: {timeouts:?}");
        }

        Ok(Constraints {
            competitor_ram,
            cpus: cpus.into_iter().collect(),
            cpus_per_competitor,
            timeouts,
        })
    }
}

fn cpu_list_to_set(s: &str) -> anyhow::Result<BTreeSet<u8>> {
    fn parse_cpu(value: &str) -> anyhow::Result<u8> {
        value
            .trim()
            .parse()
            .with_context(|| format!("could not parse {value}"))
    }

    if s.trim().is_empty() {
        bail!("Empty string");
    }
    let mut set = BTreeSet::new();
    for item in s.split(',') {
        match item.split('-').collect::<Vec<_>>()[..] {
            [value] => {
                set.insert(parse_cpu(value)?);
            }
            [start, end] => {
                let (start, end) = (parse_cpu(start)?, parse_cpu(end)?);
                set.extend(start.min(end)..=start.max(end));
            }
            _ => bail!(
                "each comma-separated item must be a number or a range (e.g. '0-3'), got '{item}'"
            ),
        }
    }
    Ok(set)
}

/// Obtained using `ConstraintsBuilder`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraints {
    pub(crate) competitor_ram: usize,
    /// sorted
    pub(crate) cpus: Vec<u8>,
    pub(crate) cpus_per_competitor: usize,
    pub(crate) timeouts: Timeouts,
}

impl Constraints {
    pub fn builder() -> ConstraintsBuilder {
        ConstraintsBuilder::new()
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// RAM limit of one competitor, in bytes.
    pub fn competitor_ram(&self) -> usize {
        self.competitor_ram
    }

    /// CPU list (cgroup `cpuset` syntax) of the competitor seated at `slot`.
    ///
    /// Slots get consecutive CPUs, wrapping around when there are fewer CPUs than
    /// competitors.
    pub fn cpus_for(&self, slot: usize) -> String {
        (0..self.cpus_per_competitor)
            .map(|i| self.cpus[(slot * self.cpus_per_competitor + i) % self.cpus.len()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|cpu| cpu.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}
