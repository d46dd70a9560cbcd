//! Config for the referee behaviors
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive, set the value to `"true"` to enable one.
//!
//! - `LIARS_DICE_VERBOSE`: Print the match report to stdout (default: `true`)
//! - `LIARS_DICE_LOG`: Enable logging to a file (default: `false`)
//! - `LIARS_DICE_CONTAIN`: Run competitors inside a cgroup (default: `true`)
//! - `LIARS_DICE_ALLOW_UNCONTAINED`: Fall back to uncontained processes when cgroups are unavailable (default: `false`)
//! - `LIARS_DICE_SHOW_LOGS`: Print what competitors wrote on stderr after each set (default: `true`)
//! - `LIARS_DICE_SEED`: Seed of the referee's random generator (default: random)
//! - `LIARS_DICE_HISTORY_FILE`: Where to save every played match (default: `all-games.json`)

use std::path::PathBuf;

/// Default location of the saved match history.
pub const DEFAULT_HISTORY_FILE: &str = "all-games.json";

/// Configuration for referee behaviors.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) contain: bool,
    pub(crate) allow_uncontained: bool,
    pub(crate) show_competitor_logs: bool,
    pub(crate) seed: Option<u64>,
    pub(crate) history_file: Option<PathBuf>,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - The referee prints every match to stdout.
    /// - Logging to file is disabled.
    /// - Competitors run inside a cgroup, and failing to create one is an error.
    /// - Competitor stderr is printed after each set.
    /// - The random generator is seeded from the OS.
    /// - The history is not saved.
    pub fn new() -> Self {
        Self {
            verbose: true,
            log: false,
            contain: true,
            allow_uncontained: false,
            show_competitor_logs: true,
            seed: None,
            history_file: None,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Unlike [`Configuration::new`], the history is saved to [`DEFAULT_HISTORY_FILE`] unless
    /// `LIARS_DICE_HISTORY_FILE` says otherwise. An unparsable seed is ignored.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        Self {
            verbose: get_env_flag("LIARS_DICE_VERBOSE", true),
            log: get_env_flag("LIARS_DICE_LOG", false),
            contain: get_env_flag("LIARS_DICE_CONTAIN", true),
            allow_uncontained: get_env_flag("LIARS_DICE_ALLOW_UNCONTAINED", false),
            show_competitor_logs: get_env_flag("LIARS_DICE_SHOW_LOGS", true),
            seed: std::env::var("LIARS_DICE_SEED")
                .ok()
                .and_then(|seed| seed.trim().parse().ok()),
            history_file: Some(
                std::env::var_os("LIARS_DICE_HISTORY_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE)),
            ),
        }
    }

    /// Enable or disable the stdout report.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Run competitors inside a cgroup or as plain child processes.
    pub fn with_contain(mut self, value: bool) -> Self {
        self.contain = value;
        self
    }

    /// Enable or disable the uncontained fallback.
    pub fn with_allow_uncontained(mut self, value: bool) -> Self {
        self.allow_uncontained = value;
        self
    }

    pub fn with_show_competitor_logs(mut self, value: bool) -> Self {
        self.show_competitor_logs = value;
        self
    }

    /// Make the championship reproducible (as long as competitors are deterministic).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_file = Some(path.into());
        self
    }

    pub fn without_history_file(mut self) -> Self {
        self.history_file = None;
        self
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn history_file(&self) -> Option<&std::path::Path> {
        self.history_file.as_deref()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
